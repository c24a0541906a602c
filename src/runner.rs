//! Ordered scripted test runner for acceptance scenarios.
//!
//! All bookkeeping lives in an explicit [`TestRunContext`] handed through
//! the scenario functions; there is no process-wide runner state. Tests
//! report failures as values, so one failing step never aborts the rest of
//! a scripted run.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use log::{error, info};

use crate::Error;

/// Outcome of one scripted test step.
pub type TestOutcome = std::result::Result<(), Failure>;

#[derive(Debug)]
pub struct Failure(pub String);

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Failure(err.to_string())
    }
}

impl From<String> for Failure {
    fn from(msg: String) -> Self {
        Failure(msg)
    }
}

impl From<&str> for Failure {
    fn from(msg: &str) -> Self {
        Failure(msg.to_string())
    }
}

/// Fails the current step unless `condition` holds.
pub fn check(condition: bool, message: &str) -> TestOutcome {
    if condition {
        Ok(())
    } else {
        Err(Failure(message.to_string()))
    }
}

pub fn check_eq<T: PartialEq + fmt::Debug>(actual: T, expected: T) -> TestOutcome {
    if actual == expected {
        Ok(())
    } else {
        Err(Failure(format!("expected {expected:?}, got {actual:?}")))
    }
}

/// Asserts that `result` is an error, optionally requiring the message to
/// contain `needle` (case-insensitive).
pub fn expect_error<T>(result: crate::Result<T>, needle: Option<&str>) -> TestOutcome {
    match result {
        Ok(_) => Err(Failure("operation did not fail".to_string())),
        Err(err) => match needle {
            Some(needle)
                if !err
                    .to_string()
                    .to_lowercase()
                    .contains(&needle.to_lowercase()) =>
            {
                Err(Failure(format!(
                    "message '{needle}' not found in error '{err}'"
                )))
            }
            _ => Ok(()),
        },
    }
}

struct SuiteState {
    name: String,
    tests_total: u32,
    tests_passed: u32,
}

/// Accumulates suite and test results over a scripted run.
pub struct TestRunContext {
    suites_total: u32,
    suites_passed: u32,
    tests_total: u32,
    tests_passed: u32,
    current_suite: Option<SuiteState>,
    started: Instant,
}

impl TestRunContext {
    pub fn new() -> Self {
        TestRunContext {
            suites_total: 0,
            suites_passed: 0,
            tests_total: 0,
            tests_passed: 0,
            current_suite: None,
            started: Instant::now(),
        }
    }

    /// Opens a new suite, closing the previous one.
    pub fn suite(&mut self, name: &str) {
        self.close_suite();
        info!("{name}");
        self.suites_total += 1;
        self.current_suite = Some(SuiteState {
            name: name.to_string(),
            tests_total: 0,
            tests_passed: 0,
        });
    }

    /// Runs one scripted test step and records its outcome.
    pub async fn test<F, Fut>(&mut self, name: &str, body: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TestOutcome>,
    {
        self.tests_total += 1;
        if let Some(suite) = &mut self.current_suite {
            suite.tests_total += 1;
        }
        match body().await {
            Ok(()) => {
                info!("    √ {name}");
                self.tests_passed += 1;
                if let Some(suite) = &mut self.current_suite {
                    suite.tests_passed += 1;
                }
            }
            Err(failure) => {
                error!("    × {name} - test failed. {failure}");
            }
        }
    }

    pub fn report(mut self) -> TestReport {
        self.close_suite();
        TestReport {
            suites_total: self.suites_total,
            suites_passed: self.suites_passed,
            tests_total: self.tests_total,
            tests_passed: self.tests_passed,
            elapsed: self.started.elapsed(),
        }
    }

    fn close_suite(&mut self) {
        if let Some(suite) = self.current_suite.take() {
            if suite.tests_passed == suite.tests_total {
                self.suites_passed += 1;
            } else {
                error!(
                    "suite '{}': {} / {} tests passed",
                    suite.name, suite.tests_passed, suite.tests_total
                );
            }
        }
    }
}

impl Default for TestRunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct TestReport {
    pub suites_total: u32,
    pub suites_passed: u32,
    pub tests_total: u32,
    pub tests_passed: u32,
    pub elapsed: Duration,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.suites_passed == self.suites_total
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test result:")?;
        writeln!(
            f,
            "  Test suites: {} / {} passed",
            self.suites_passed, self.suites_total
        )?;
        writeln!(
            f,
            "  Tests:       {} / {} passed",
            self.tests_passed, self.tests_total
        )?;
        writeln!(f, "  Time:        {:.3} seconds", self.elapsed.as_secs_f64())?;
        write!(
            f,
            "  Result:      {}",
            if self.passed() { "PASSED" } else { "FAILED" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_passing_and_failing_tests() {
        let mut ctx = TestRunContext::new();
        ctx.suite("first");
        ctx.test("passes", || async { check(true, "fine") }).await;
        ctx.test("fails", || async { check(false, "broken") }).await;
        ctx.suite("second");
        ctx.test("passes", || async { Ok(()) }).await;
        let report = ctx.report();
        assert_eq!(report.suites_total, 2);
        assert_eq!(report.suites_passed, 1);
        assert_eq!(report.tests_total, 3);
        assert_eq!(report.tests_passed, 2);
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn empty_suites_count_as_passed() {
        let mut ctx = TestRunContext::new();
        ctx.suite("empty");
        let report = ctx.report();
        assert_eq!(report.suites_total, 1);
        assert_eq!(report.suites_passed, 1);
        assert!(report.passed());
    }

    #[tokio::test]
    async fn failing_step_does_not_stop_the_run() {
        let mut ctx = TestRunContext::new();
        ctx.suite("suite");
        ctx.test("fails", || async { Err("boom".into()) }).await;
        ctx.test("still runs", || async { Ok(()) }).await;
        let report = ctx.report();
        assert_eq!(report.tests_total, 2);
        assert_eq!(report.tests_passed, 1);
    }

    #[test]
    fn expect_error_matches_substring_case_insensitively() {
        let err: crate::Result<()> = Err(Error::NotInitialized);
        assert!(expect_error(err, Some("NOT INITIALIZED")).is_ok());
        let err: crate::Result<()> = Err(Error::Unavailable);
        assert!(expect_error(err, Some("timeout")).is_err());
        let ok: crate::Result<()> = Ok(());
        assert!(expect_error(ok, None).is_err());
        let err: crate::Result<()> = Err(Error::Unavailable);
        assert!(expect_error(err, None).is_ok());
    }

    #[test]
    fn check_eq_reports_both_values() {
        let failure = check_eq(1, 2).unwrap_err();
        assert!(failure.0.contains('1'));
        assert!(failure.0.contains('2'));
    }

    #[test]
    fn report_display_shows_verdict() {
        let report = TestReport {
            suites_total: 1,
            suites_passed: 1,
            tests_total: 2,
            tests_passed: 2,
            elapsed: Duration::from_millis(1500),
        };
        let text = report.to_string();
        assert!(text.contains("1 / 1"));
        assert!(text.contains("2 / 2"));
        assert!(text.contains("PASSED"));
    }
}
