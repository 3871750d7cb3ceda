use std::{process::Stdio, time::Duration};

use entity::{exams_exercise_testcases, sea_orm_active_enums::ExamsExerciseKind};
use lib::config::{RunnersConfig, SandboxConfig};
use sandbox_client::{
    schemas::{OutcomeKind, RunParameters, RunRequest, RunSpec},
    SandboxClient,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{process::Command, time::timeout};
use tracing::error;
use uuid::Uuid;

use crate::schemas::execution::{ExecutionResults, ExecutionState, TestCaseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgrammingLanguage {
    C,
    Javascript,
    Python,
}

/// The execution language of an exercise, or `None` for non-programming
/// kinds.
pub fn language_of(kind: &ExamsExerciseKind) -> Option<ProgrammingLanguage> {
    match kind {
        ExamsExerciseKind::C => Some(ProgrammingLanguage::C),
        ExamsExerciseKind::Javascript => Some(ProgrammingLanguage::Javascript),
        ExamsExerciseKind::Python => Some(ProgrammingLanguage::Python),
        _ => None,
    }
}

/// Runs learner code against the hidden test cases of an exercise.
///
/// Compiled languages go through the HTTP sandbox one test case at a time;
/// interpreted languages are evaluated in a single batch by an external
/// runner process. Whatever goes wrong underneath, the caller always gets a
/// well-formed [`ExecutionResults`] back, never an error.
pub struct ExecutionClient<'a> {
    pub sandbox: &'a SandboxClient,
    pub sandbox_config: &'a SandboxConfig,
    pub runners: &'a RunnersConfig,
}

impl ExecutionClient<'_> {
    pub async fn execute(
        &self,
        code: &str,
        testcases: &[exams_exercise_testcases::Model],
        language: ProgrammingLanguage,
    ) -> ExecutionResults {
        let result = match language {
            ProgrammingLanguage::C => self.run_compiled(code, testcases).await,
            ProgrammingLanguage::Javascript => {
                self.run_script(
                    &self.runners.node_path,
                    &self.runners.js_runner_script,
                    code,
                    testcases,
                )
                .await
            }
            ProgrammingLanguage::Python => {
                self.run_script(
                    &self.runners.python_path,
                    &self.runners.python_runner_script,
                    code,
                    testcases,
                )
                .await
            }
        };
        match result {
            Ok(results) => results,
            Err(err) => {
                error!("code execution failed: {err}");
                ExecutionResults::internal_error()
            }
        }
    }

    /// One sandbox run per test case. A compilation failure on any test case
    /// aborts the loop and is reported once for the whole run.
    async fn run_compiled(
        &self,
        code: &str,
        testcases: &[exams_exercise_testcases::Model],
    ) -> Result<ExecutionResults, RunFailure> {
        let mut tests = Vec::with_capacity(testcases.len());
        for testcase in testcases {
            let result = self
                .sandbox
                .submit_run(&RunRequest {
                    run_spec: RunSpec {
                        language_id: &self.sandbox_config.c_language_id,
                        input: &testcase.stdin,
                        sourcecode: code,
                        parameters: RunParameters {
                            linkargs: &self.sandbox_config.c_link_args,
                        },
                    },
                })
                .await?;
            if result.outcome == OutcomeKind::CompilationError {
                return Ok(ExecutionResults::compilation_failed(
                    result.cmpinfo.unwrap_or_default(),
                ));
            }
            let passed = result.outcome == OutcomeKind::Ok
                && stdout_matches(
                    result.stdout.as_deref().unwrap_or_default(),
                    &testcase.expected_stdout,
                );
            tests.push(TestCaseResult {
                id: testcase.id,
                passed,
                error: (result.outcome != OutcomeKind::Ok)
                    .then(|| result.outcome.as_str().to_owned()),
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }
        Ok(ExecutionResults::completed(tests))
    }

    /// One batch run through the external runner process. The runner
    /// evaluates the user code once, applies every assertion to the
    /// resulting environment and isolates per-test failures itself.
    async fn run_script(
        &self,
        program: &str,
        script: &str,
        code: &str,
        testcases: &[exams_exercise_testcases::Model],
    ) -> Result<ExecutionResults, RunFailure> {
        let batch: Vec<BatchTestcase> = testcases
            .iter()
            .map(|t| BatchTestcase {
                id: t.id,
                assertion: &t.code,
            })
            .collect();
        let output = timeout(
            Duration::from_secs(self.runners.timeout),
            Command::new(program)
                .arg(script)
                .arg(code)
                .arg(serde_json::to_string(&batch)?)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| RunFailure::Timeout)??;
        if !output.status.success() {
            return Err(RunFailure::RunnerFailed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let parsed: RunnerOutput = serde_json::from_slice(&output.stdout)?;
        Ok(ExecutionResults {
            tests: parsed.tests,
            compilation_errors: parsed.compilation_errors,
            execution_error: parsed.execution_error,
            state: ExecutionState::Completed,
            run_id: None,
        })
    }
}

#[derive(Debug, Serialize)]
struct BatchTestcase<'a> {
    id: Uuid,
    assertion: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunnerOutput {
    #[serde(default)]
    tests: Option<Vec<TestCaseResult>>,
    #[serde(default)]
    compilation_errors: Option<String>,
    #[serde(default)]
    execution_error: Option<String>,
}

/// A run passes only if stdout matches the expected output after dropping
/// trailing newlines and trailing spaces from both sides of the comparison.
fn stdout_matches(actual: &str, expected: &str) -> bool {
    trim_output(actual) == trim_output(expected)
}

fn trim_output(output: &str) -> &str {
    output.trim_end_matches('\n').trim_end_matches(' ')
}

#[derive(Debug, Error)]
enum RunFailure {
    #[error("sandbox error: {0}")]
    Sandbox(#[from] sandbox_client::Error),
    #[error("could not run the runner process: {0}")]
    Io(#[from] std::io::Error),
    #[error("runner exceeded the batch timeout")]
    Timeout,
    #[error("serde_json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("runner exited with status {status:?}: {stderr}")]
    RunnerFailed {
        status: Option<i32>,
        stderr: String,
    },
}

#[cfg(test)]
mod tests {
    use entity::sea_orm_active_enums::ExamsTestcaseVisibility;

    use super::*;

    fn testcase(id: u128, stdin: &str, expected_stdout: &str) -> exams_exercise_testcases::Model {
        exams_exercise_testcases::Model {
            id: Uuid::from_u128(id),
            exercise_id: Uuid::from_u128(1),
            code: String::new(),
            stdin: stdin.into(),
            expected_stdout: expected_stdout.into(),
            text: String::new(),
            visibility: ExamsTestcaseVisibility::Hidden,
            position: id as i32,
        }
    }

    fn sandbox_config() -> SandboxConfig {
        SandboxConfig {
            url: "http://127.0.0.1:9/".parse().unwrap(),
            request_timeout: 2,
            c_language_id: "c".into(),
            c_link_args: vec!["-lm".into()],
        }
    }

    fn runners_config() -> RunnersConfig {
        RunnersConfig {
            node_path: "/nonexistent/node".into(),
            js_runner_script: "run_js.js".into(),
            python_path: "/nonexistent/python3".into(),
            python_runner_script: "run_python.py".into(),
            timeout: 2,
        }
    }

    #[test]
    fn stdout_comparison_ignores_trailing_whitespace() {
        assert!(stdout_matches("42\n", "42"));
        assert!(stdout_matches("42 \n", "42"));
        assert!(stdout_matches("42", "42\n\n"));
        assert!(stdout_matches("a\nb\n", "a\nb"));
        assert!(!stdout_matches("42", "43"));
        assert!(!stdout_matches(" 42", "42"));
    }

    #[test]
    fn runner_output_accepts_partial_shapes() {
        let parsed: RunnerOutput = serde_json::from_str(r#"{"tests": []}"#).unwrap();
        assert_eq!(parsed.tests, Some(vec![]));
        assert_eq!(parsed.execution_error, None);

        let parsed: RunnerOutput =
            serde_json::from_str(r#"{"execution_error": "ReferenceError"}"#).unwrap();
        assert!(parsed.tests.is_none());
        assert_eq!(parsed.execution_error.as_deref(), Some("ReferenceError"));
    }

    #[tokio::test]
    async fn unreachable_sandbox_yields_internal_error() {
        let sandbox_config = sandbox_config();
        let runners = runners_config();
        let sandbox =
            SandboxClient::new(sandbox_config.url.clone(), Duration::from_secs(2)).unwrap();
        let client = ExecutionClient {
            sandbox: &sandbox,
            sandbox_config: &sandbox_config,
            runners: &runners,
        };
        let results = client
            .execute(
                "int main() { return 0; }",
                &[testcase(1, "", "")],
                ProgrammingLanguage::C,
            )
            .await;
        assert_eq!(results.state, ExecutionState::InternalError);
        assert!(results.tests.is_none());
    }

    #[tokio::test]
    async fn missing_runner_binary_yields_internal_error() {
        let sandbox_config = sandbox_config();
        let runners = runners_config();
        let sandbox =
            SandboxClient::new(sandbox_config.url.clone(), Duration::from_secs(2)).unwrap();
        let client = ExecutionClient {
            sandbox: &sandbox,
            sandbox_config: &sandbox_config,
            runners: &runners,
        };
        let results = client
            .execute("console.log(42)", &[], ProgrammingLanguage::Javascript)
            .await;
        assert_eq!(results.state, ExecutionState::InternalError);
    }
}
