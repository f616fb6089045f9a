//! Bounded retry around one logical step.

use crate::errors::AutomationError;
use crate::types::{EngineConfig, StepOutcome};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// How a step executor should behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Perform the step, mutations included.
    Live,
    /// Simulation: discovery still happens (with a shortened lookup
    /// deadline), the mutating dispatch is never reached, and evidence is
    /// tagged accordingly.
    Skip,
}

impl StepMode {
    pub fn is_skip(&self) -> bool {
        matches!(self, StepMode::Skip)
    }
}

/// A step that exhausted its attempts. The error is augmented with the step
/// name and the number of attempts consumed, not swallowed; the
/// state machine converts it into the target's terminal failure.
#[derive(Debug)]
pub struct StepError {
    pub step: &'static str,
    pub attempt: u32,
    pub error: AutomationError,
}

/// Wraps step executors with a bounded retry loop, fixed inter-attempt
/// delay, and structured evidence capture.
pub struct StepRunner {
    config: Arc<EngineConfig>,
}

impl StepRunner {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Execute `f` up to `1 + max_retries` times (once when not retryable).
    /// The first success short-circuits. The delay between attempts is the
    /// fixed retry delay, unrelated to inter-target pacing.
    pub async fn run<F, Fut>(
        &self,
        name: &'static str,
        retryable: bool,
        mode: StepMode,
        f: F,
    ) -> Result<StepOutcome, StepError>
    where
        F: Fn(StepMode) -> Fut,
        Fut: Future<Output = Result<Value, AutomationError>>,
    {
        let attempts = if retryable {
            1 + self.config.max_retries
        } else {
            1
        };
        let mut last_error: Option<AutomationError> = None;

        for attempt in 1..=attempts {
            match f(mode).await {
                Ok(evidence) => {
                    debug!(step = name, attempt, "step succeeded");
                    return Ok(StepOutcome {
                        name: name.to_string(),
                        ok: true,
                        attempt,
                        evidence: Some(tag_mode(evidence, mode)),
                        reason_code: None,
                    });
                }
                Err(error) => {
                    if attempt < attempts {
                        warn!(
                            step = name,
                            attempt,
                            attempts,
                            error = %error,
                            "step attempt failed, retrying"
                        );
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                    last_error = Some(error);
                }
            }
        }

        let error = last_error.expect("at least one attempt ran");
        Err(StepError {
            step: name,
            attempt: attempts,
            error,
        })
    }
}

fn tag_mode(evidence: Value, mode: StepMode) -> Value {
    if !mode.is_skip() {
        return evidence;
    }
    match evidence {
        Value::Object(mut map) => {
            map.insert("skip".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        other => serde_json::json!({ "skip": true, "detail": other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> Arc<EngineConfig> {
        Arc::new(EngineConfig {
            max_retries,
            retry_delay_ms: 1,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn retry_bound_is_one_plus_max_retries() {
        let runner = StepRunner::new(fast_config(2));
        let calls = AtomicU32::new(0);

        let result = runner
            .run("open_menu", true, StepMode::Live, |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Value, _>(AutomationError::ElementMissing("nothing".into()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let err = result.unwrap_err();
        assert_eq!(err.step, "open_menu");
        assert_eq!(err.attempt, 3);
        assert!(matches!(err.error, AutomationError::ElementMissing(_)));
    }

    #[tokio::test]
    async fn first_attempt_success_short_circuits() {
        let runner = StepRunner::new(fast_config(5));
        let calls = AtomicU32::new(0);

        let outcome = runner
            .run("guard", true, StepMode::Live, |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "ready": true }))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(outcome.ok);
        assert_eq!(outcome.attempt, 1);
        assert!(outcome.reason_code.is_none());
    }

    #[tokio::test]
    async fn non_retryable_step_runs_exactly_once() {
        let runner = StepRunner::new(fast_config(4));
        let calls = AtomicU32::new(0);

        let result = runner
            .run("verify", false, StepMode::Live, |_| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Value, _>(AutomationError::VerifyTimeout("deadline".into()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().attempt, 1);
    }

    #[tokio::test]
    async fn recovery_on_second_attempt_reports_attempt_two() {
        let runner = StepRunner::new(fast_config(1));
        let calls = AtomicU32::new(0);

        let outcome = runner
            .run("locate_destructive", true, StepMode::Live, |_| async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AutomationError::ElementMissing("not yet".into()))
                } else {
                    Ok(json!({ "found": true }))
                }
            })
            .await
            .unwrap();

        assert!(outcome.ok);
        assert_eq!(outcome.attempt, 2);
    }

    #[tokio::test]
    async fn skip_mode_tags_evidence() {
        let runner = StepRunner::new(fast_config(0));

        let outcome = runner
            .run("locate_entry", true, StepMode::Skip, |mode| async move {
                assert!(mode.is_skip());
                Ok(json!({ "found": true }))
            })
            .await
            .unwrap();

        let evidence = outcome.evidence.unwrap();
        assert_eq!(evidence["skip"], json!(true));
        assert_eq!(evidence["found"], json!(true));
    }
}
