use serde::{Deserialize, Deserializer, Serialize};

/// A single run submitted to the sandbox.
#[derive(Debug, Serialize)]
pub struct RunRequest<'a> {
    pub run_spec: RunSpec<'a>,
}

#[derive(Debug, Serialize)]
pub struct RunSpec<'a> {
    pub language_id: &'a str,
    /// Data fed to the program on stdin.
    pub input: &'a str,
    pub sourcecode: &'a str,
    #[serde(skip_serializing_if = "RunParameters::is_empty")]
    pub parameters: RunParameters<'a>,
}

#[derive(Debug, Serialize)]
pub struct RunParameters<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub linkargs: &'a [String],
}

impl RunParameters<'_> {
    fn is_empty(&self) -> bool {
        self.linkargs.is_empty()
    }
}

/// Outcome of a sandbox run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunResult {
    #[serde(deserialize_with = "deserialize_outcome")]
    pub outcome: OutcomeKind,
    /// Compiler diagnostics, present on compilation failure.
    #[serde(default)]
    pub cmpinfo: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
}

/// The sandbox outcome taxonomy.
///
/// `Ok` only means the program ran to completion; whether its output is
/// correct is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    CompilationError,
    RuntimeError,
    Timeout,
    Ok,
    MemoryLimitExceeded,
    IllegalSystemCall,
    InternalError,
    Overload,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompilationError => "compilation_error",
            Self::RuntimeError => "runtime_error",
            Self::Timeout => "timeout",
            Self::Ok => "ok",
            Self::MemoryLimitExceeded => "memory_limit_exceeded",
            Self::IllegalSystemCall => "illegal_system_call",
            Self::InternalError => "internal_error",
            Self::Overload => "overload",
        }
    }
}

// The wire protocol identifies outcomes by opaque integers. Codes not in the
// contract are treated as sandbox-internal failures.
fn outcome_from_code(code: i64) -> OutcomeKind {
    match code {
        11 => OutcomeKind::CompilationError,
        12 => OutcomeKind::RuntimeError,
        13 => OutcomeKind::Timeout,
        15 => OutcomeKind::Ok,
        17 => OutcomeKind::MemoryLimitExceeded,
        19 => OutcomeKind::IllegalSystemCall,
        21 => OutcomeKind::Overload,
        _ => OutcomeKind::InternalError,
    }
}

fn deserialize_outcome<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<OutcomeKind, D::Error> {
    Ok(outcome_from_code(i64::deserialize(deserializer)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_codes() {
        assert_eq!(outcome_from_code(11), OutcomeKind::CompilationError);
        assert_eq!(outcome_from_code(12), OutcomeKind::RuntimeError);
        assert_eq!(outcome_from_code(13), OutcomeKind::Timeout);
        assert_eq!(outcome_from_code(15), OutcomeKind::Ok);
        assert_eq!(outcome_from_code(17), OutcomeKind::MemoryLimitExceeded);
        assert_eq!(outcome_from_code(19), OutcomeKind::IllegalSystemCall);
        assert_eq!(outcome_from_code(20), OutcomeKind::InternalError);
        assert_eq!(outcome_from_code(21), OutcomeKind::Overload);
        // unknown codes are never surfaced as anything but an internal error
        assert_eq!(outcome_from_code(0), OutcomeKind::InternalError);
        assert_eq!(outcome_from_code(-3), OutcomeKind::InternalError);
    }

    #[test]
    fn run_result_deserialization() {
        let result: RunResult = serde_json::from_str(
            r#"{"outcome": 15, "stdout": "42\n", "stderr": ""}"#,
        )
        .unwrap();
        assert_eq!(result.outcome, OutcomeKind::Ok);
        assert_eq!(result.stdout.as_deref(), Some("42\n"));
        assert_eq!(result.cmpinfo, None);

        let result: RunResult =
            serde_json::from_str(r#"{"outcome": 11, "cmpinfo": "main.c:1: error"}"#).unwrap();
        assert_eq!(result.outcome, OutcomeKind::CompilationError);
        assert_eq!(result.cmpinfo.as_deref(), Some("main.c:1: error"));
    }

    #[test]
    fn run_request_serialization() {
        let linkargs = vec!["-lm".to_owned()];
        let request = RunRequest {
            run_spec: RunSpec {
                language_id: "c",
                input: "1 2",
                sourcecode: "int main() {}",
                parameters: RunParameters {
                    linkargs: &linkargs,
                },
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["run_spec"]["language_id"], "c");
        assert_eq!(value["run_spec"]["parameters"]["linkargs"][0], "-lm");

        let request = RunRequest {
            run_spec: RunSpec {
                language_id: "c",
                input: "",
                sourcecode: "int main() {}",
                parameters: RunParameters { linkargs: &[] },
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value["run_spec"].get("parameters").is_none());
    }
}
