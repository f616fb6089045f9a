//! Sequential orchestration across targets.
//!
//! The hosting surface is a single shared rendering context: two automations
//! can never run at once, so targets are processed strictly in input order
//! and outcomes are recorded in that same order.

use crate::pipeline;
use crate::surface::DocumentSurface;
use crate::types::{BatchOutcome, EngineConfig, StepOutcome, Target, TargetOutcome};
use rand::Rng;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Admission control for destructive actions. The engine only consults the
/// gate it is handed; enforcement policy belongs to the caller layer.
#[async_trait::async_trait]
pub trait RateGate: Send + Sync {
    /// Wait until another destructive action is admissible.
    async fn acquire(&self);
}

/// A rolling-window gate: at most `capacity` admissions per `window`.
pub struct RollingWindowGate {
    capacity: u32,
    window: Duration,
    stamps: tokio::sync::Mutex<VecDeque<Instant>>,
}

impl RollingWindowGate {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            // A zero-capacity gate would never admit anything.
            capacity: capacity.max(1),
            window,
            stamps: tokio::sync::Mutex::new(VecDeque::new()),
        }
    }

    pub fn per_minute(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(60))
    }
}

#[async_trait::async_trait]
impl RateGate for RollingWindowGate {
    async fn acquire(&self) {
        loop {
            let wait = {
                let mut stamps = self.stamps.lock().await;
                let now = Instant::now();
                while stamps
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    stamps.pop_front();
                }
                if (stamps.len() as u32) < self.capacity {
                    stamps.push_back(now);
                    return;
                }
                let oldest = *stamps.front().expect("non-empty at capacity");
                self.window - now.duration_since(oldest)
            };
            debug!(?wait, "rate gate full, waiting for the window to roll");
            tokio::time::sleep(wait).await;
        }
    }
}

/// Runs the per-target state machine across a batch.
pub struct BatchRunner {
    surface: Arc<dyn DocumentSurface>,
    config: Arc<EngineConfig>,
    cancel: Option<CancellationToken>,
    rate_gate: Option<Arc<dyn RateGate>>,
}

impl BatchRunner {
    pub fn new(surface: Arc<dyn DocumentSurface>, config: Arc<EngineConfig>) -> Self {
        Self {
            surface,
            config,
            cancel: None,
            rate_gate: None,
        }
    }

    /// Cooperative cancellation, checked only between targets: a target
    /// already in flight runs to its terminal state. Known limitation, not
    /// an accident.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_rate_gate(mut self, gate: Arc<dyn RateGate>) -> Self {
        self.rate_gate = Some(gate);
        self
    }

    /// Process `raw_targets` strictly sequentially. Individual failures
    /// never abort the batch; only cancellation stops it early.
    #[instrument(level = "debug", skip_all, fields(targets = raw_targets.len()))]
    pub async fn run(&self, raw_targets: &[String]) -> BatchOutcome {
        let mut results: Vec<TargetOutcome> = Vec::with_capacity(raw_targets.len());
        let mut cancelled = false;

        for (index, raw) in raw_targets.iter().enumerate() {
            if let Some(token) = &self.cancel {
                if token.is_cancelled() {
                    info!(
                        processed = results.len(),
                        remaining = raw_targets.len() - index,
                        "batch cancelled between targets"
                    );
                    cancelled = true;
                    break;
                }
            }

            if index > 0 {
                self.pace().await;
            }

            let target = match Target::parse(raw) {
                Ok(target) => target,
                Err(error) => {
                    warn!(input = raw.as_str(), %error, "skipping unresolvable target");
                    results.push(invalid_outcome(raw.clone(), &error.to_string()));
                    continue;
                }
            };

            if let (Some(gate), false) = (&self.rate_gate, self.config.dry_run) {
                gate.acquire().await;
            }

            let outcome = pipeline::run(
                self.surface.clone(),
                self.config.clone(),
                raw.clone(),
                target,
            )
            .await;
            results.push(outcome);
        }

        let succeeded = results.iter().filter(|r| r.ok).count();
        info!(
            attempted = results.len(),
            succeeded, cancelled, "batch finished"
        );
        BatchOutcome {
            attempted: results.len(),
            succeeded,
            cancelled,
            results,
        }
    }

    /// Inter-target pacing: base delay plus uniform random jitter.
    async fn pace(&self) {
        let (jitter_min, jitter_max) = self.config.jitter_range_ms;
        let jitter = if jitter_max > jitter_min {
            rand::thread_rng().gen_range(jitter_min..=jitter_max)
        } else {
            jitter_min
        };
        let pause = self.config.inter_target_delay() + Duration::from_millis(jitter);
        debug!(?pause, "pacing before next target");
        tokio::time::sleep(pause).await;
    }
}

fn invalid_outcome(input: String, detail: &str) -> TargetOutcome {
    TargetOutcome {
        input,
        target: None,
        ok: false,
        step: Some("init".to_string()),
        reason_code: Some("invalid_url".to_string()),
        attempt: 1,
        evidence: vec![StepOutcome {
            name: "init".to_string(),
            ok: false,
            attempt: 1,
            evidence: Some(json!({ "error": detail })),
            reason_code: Some("invalid_url".to_string()),
        }],
    }
}
