//! Delegated test-runner port
//!
//! The governance pipeline does not know how to run tests for any
//! particular language; it delegates to this port and reports the
//! pass/fail verbatim.

use std::path::PathBuf;
use std::process::Command;

/// Errors from the delegated runner
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The runner could not be spawned
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one delegated test run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunOutcome {
    pub passed: bool,
    pub output: String,
}

/// External test execution port
pub trait TestRunner {
    /// Run the project's tests once
    ///
    /// # Errors
    /// [`RunnerError`] when the runner cannot be started; a timeout or
    /// crash must surface here, never be swallowed.
    fn run(&self) -> Result<TestRunOutcome, RunnerError>;
}

/// Subprocess runner with a configurable argv
#[derive(Debug, Clone)]
pub struct CommandTestRunner {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandTestRunner {
    /// Runner invoking `program args...` in `cwd`
    #[must_use]
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
        }
    }
}

impl TestRunner for CommandTestRunner {
    fn run(&self) -> Result<TestRunOutcome, RunnerError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .output()
            .map_err(|source| RunnerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        tracing::debug!(program = %self.program, passed = output.status.success(), "test run finished");
        Ok(TestRunOutcome {
            passed: output.status.success(),
            output: text,
        })
    }
}

/// In-memory double returning a fixed outcome
#[derive(Debug, Clone)]
pub struct StaticTestRunner {
    outcome: TestRunOutcome,
}

impl StaticTestRunner {
    /// Double that always passes
    #[must_use]
    pub fn passing() -> Self {
        Self {
            outcome: TestRunOutcome {
                passed: true,
                output: "all tests passed".to_string(),
            },
        }
    }

    /// Double that always fails with the given output
    #[must_use]
    pub fn failing(output: impl Into<String>) -> Self {
        Self {
            outcome: TestRunOutcome {
                passed: false,
                output: output.into(),
            },
        }
    }
}

impl TestRunner for StaticTestRunner {
    fn run(&self) -> Result<TestRunOutcome, RunnerError> {
        Ok(self.outcome.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_runner_outcomes() {
        assert!(StaticTestRunner::passing().run().unwrap().passed);
        let failed = StaticTestRunner::failing("2 tests failed").run().unwrap();
        assert!(!failed.passed);
        assert_eq!(failed.output, "2 tests failed");
    }

    #[test]
    fn command_runner_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let ok = CommandTestRunner::new("true", Vec::<String>::new(), dir.path());
        assert!(ok.run().unwrap().passed);

        let fail = CommandTestRunner::new("false", Vec::<String>::new(), dir.path());
        assert!(!fail.run().unwrap().passed);
    }

    #[test]
    fn command_runner_missing_program_is_loud() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandTestRunner::new(
            "definitely-not-a-real-test-runner",
            Vec::<String>::new(),
            dir.path(),
        );
        assert!(matches!(runner.run(), Err(RunnerError::Spawn { .. })));
    }
}
