use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregated outcome of running a programming submission against the test
/// cases of its exercise. Stored verbatim in the submission slot's
/// `execution_results` column and returned to clients as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResults {
    /// Per-testcase results. Absent when the run never reached the test
    /// cases, e.g. on a compilation failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<TestCaseResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compilation_errors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_error: Option<String>,
    pub state: ExecutionState,
    /// The run that produced (or is about to produce) these results. A newer
    /// enqueue for the same slot invalidates any older run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub id: Uuid,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Running,
    Completed,
    InternalError,
}

impl ExecutionResults {
    pub fn running(run_id: Uuid) -> Self {
        Self {
            tests: None,
            compilation_errors: None,
            execution_error: None,
            state: ExecutionState::Running,
            run_id: Some(run_id),
        }
    }

    pub fn completed(tests: Vec<TestCaseResult>) -> Self {
        Self {
            tests: Some(tests),
            compilation_errors: None,
            execution_error: None,
            state: ExecutionState::Completed,
            run_id: None,
        }
    }

    pub fn compilation_failed(cmpinfo: String) -> Self {
        Self {
            tests: None,
            compilation_errors: Some(cmpinfo),
            execution_error: None,
            state: ExecutionState::Completed,
            run_id: None,
        }
    }

    pub fn internal_error() -> Self {
        Self {
            tests: None,
            compilation_errors: None,
            execution_error: None,
            state: ExecutionState::InternalError,
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn passed_testcases(&self) -> usize {
        self.tests
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|t| t.passed)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_roundtrip() {
        let results = ExecutionResults::running(Uuid::from_u128(7));
        let value = serde_json::to_value(&results).unwrap();
        assert_eq!(value["state"], "running");
        assert!(value.get("tests").is_none());
        let back: ExecutionResults = serde_json::from_value(value).unwrap();
        assert_eq!(back, results);
    }

    #[test]
    fn passed_testcases_counts_only_passes() {
        let results = ExecutionResults::completed(vec![
            TestCaseResult {
                id: Uuid::from_u128(1),
                passed: true,
                error: None,
                stdout: Some("ok".into()),
                stderr: None,
            },
            TestCaseResult {
                id: Uuid::from_u128(2),
                passed: false,
                error: Some("runtime_error".into()),
                stdout: None,
                stderr: Some("segfault".into()),
            },
        ]);
        assert_eq!(results.passed_testcases(), 1);
        assert_eq!(ExecutionResults::internal_error().passed_testcases(), 0);
    }
}
