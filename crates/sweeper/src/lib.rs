//! Destructive bulk-flow automation for externally rendered documents.
//!
//! This crate drives a menu → destructive action → confirmation → verify
//! flow against a document it does not control and cannot address reliably:
//! controls are discovered by scoring independent heuristic signals, driven
//! through synthetic input, and the intended effect is inferred from
//! indirect signals inside a deadline. The hosting surface is abstracted
//! behind a single request/response trait, inspired by Playwright's
//! automation model.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub mod batch;
pub mod context;
pub mod element;
pub mod errors;
pub mod executor;
pub mod locator;
mod pipeline;
pub mod profile;
pub mod selector;
pub mod snapshot;
pub mod step;
pub mod surface;
#[cfg(test)]
mod tests;
pub mod types;
pub mod verify;

pub use batch::{BatchRunner, RateGate, RollingWindowGate};
pub use context::RunContext;
pub use element::ElementHandle;
pub use errors::AutomationError;
pub use locator::Locator;
pub use profile::{LocaleProfile, PatternSet};
pub use selector::{MatchSignal, Predicate};
pub use snapshot::{DocumentSnapshot, NodeId, NodeSnapshot};
pub use surface::{DocumentSurface, NodeRef, SessionId, SyntheticInput};
pub use types::{
    BatchOutcome, EngineConfig, ProbeReport, StepOutcome, Target, TargetOutcome,
};
pub use verify::{Verification, VerifySignal};

/// The main entry point for flow automation.
pub struct Engine {
    surface: Arc<dyn DocumentSurface>,
    config: Arc<EngineConfig>,
    rate_gate: Option<Arc<dyn RateGate>>,
}

impl Engine {
    /// Create an engine over a hosting surface. When the configuration
    /// carries a per-minute action cap, a rolling-window gate is installed
    /// for it; callers with their own admission policy can swap it via
    /// [`Engine::with_rate_gate`].
    pub fn new(surface: Arc<dyn DocumentSurface>, config: EngineConfig) -> Self {
        let rate_gate = config
            .rate_limit_per_minute
            .map(|n| Arc::new(RollingWindowGate::per_minute(n)) as Arc<dyn RateGate>);
        Self {
            surface,
            config: Arc::new(config),
            rate_gate,
        }
    }

    pub fn with_rate_gate(mut self, gate: Arc<dyn RateGate>) -> Self {
        self.rate_gate = Some(gate);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a whole batch of raw target addresses, strictly sequentially,
    /// recording outcomes in input order. Cancellation is honored between
    /// targets.
    #[instrument(level = "debug", skip_all, fields(targets = targets.len()))]
    pub async fn run_batch(
        &self,
        targets: &[String],
        cancel: Option<CancellationToken>,
    ) -> BatchOutcome {
        let mut runner = BatchRunner::new(self.surface.clone(), self.config.clone());
        if let Some(token) = cancel {
            runner = runner.with_cancellation(token);
        }
        if let Some(gate) = &self.rate_gate {
            runner = runner.with_rate_gate(gate.clone());
        }
        runner.run(targets).await
    }

    /// Run the full pipeline for a single raw address.
    pub async fn run_target(&self, raw: &str) -> TargetOutcome {
        match Target::parse(raw) {
            Ok(target) => {
                pipeline::run(
                    self.surface.clone(),
                    self.config.clone(),
                    raw.to_string(),
                    target,
                )
                .await
            }
            Err(error) => TargetOutcome {
                input: raw.to_string(),
                target: None,
                ok: false,
                step: Some("init".to_string()),
                reason_code: Some("invalid_url".to_string()),
                attempt: 1,
                evidence: vec![StepOutcome {
                    name: "init".to_string(),
                    ok: false,
                    attempt: 1,
                    evidence: Some(serde_json::json!({ "error": error.to_string() })),
                    reason_code: Some("invalid_url".to_string()),
                }],
            },
        }
    }

    /// Lightweight non-mutating check: a single capture scanned for the
    /// three controls the flow depends on. Dispatches nothing.
    #[instrument(level = "debug", skip(self))]
    pub async fn probe(&self, raw: &str) -> Result<ProbeReport, AutomationError> {
        let target = Target::parse(raw)?;
        let session = self.surface.ensure_session(&target.canonical_url).await?;
        self.surface.wait_ready(session).await?;

        let locale_signals = self
            .surface
            .locale_signals(session)
            .await
            .unwrap_or_default();
        let profile = profile::resolve(&locale_signals);
        let ctx = RunContext {
            surface: self.surface.clone(),
            session,
            config: self.config.clone(),
            profile,
        };
        let flow = pipeline::FlowPredicates::for_target(&target, profile);

        let snapshot = ctx.capture().await?;
        let header_found = !ctx
            .locator(flow.entry.clone())
            .within(flow.row_scope.clone())
            .all_in(&snapshot)
            .is_empty();
        let destructive_control_found =
            !ctx.locator(flow.menu_item.clone()).all_in(&snapshot).is_empty();
        let confirmation_found = !ctx.locator(flow.confirm).all_in(&snapshot).is_empty();

        Ok(ProbeReport {
            header_found,
            destructive_control_found,
            confirmation_found,
        })
    }
}

impl Clone for Engine {
    fn clone(&self) -> Self {
        Self {
            surface: self.surface.clone(),
            config: self.config.clone(),
            rate_gate: self.rate_gate.clone(),
        }
    }
}
