//! The per-target state machine.
//!
//! Strictly linear: guard, then three locate/activate pairs, then
//! verification. No backward transitions, exactly one retry scope per
//! state, and any terminal step failure ends the run immediately; an
//! unreachable later step is never attempted.

use crate::context::RunContext;
use crate::errors::AutomationError;
use crate::executor;
use crate::profile::{self, LocaleProfile};
use crate::selector::Predicate;
use crate::step::{StepError, StepMode, StepRunner};
use crate::surface::DocumentSurface;
use crate::types::{EngineConfig, StepOutcome, Target, TargetOutcome};
use crate::verify;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

/// Attribute used for explicit test hooks, the strongest locator signal.
const HOOK_KEY: &str = "data-testid";
const ENTRY_HOOK: &str = "conversation-options";
const DELETE_HOOK: &str = "delete-conversation";
const CONFIRM_HOOK: &str = "confirm-delete";

/// The heuristic predicates for one target's flow, built once per run from
/// the target and its resolved profile. Arms are listed strongest-first.
#[derive(Clone)]
pub(crate) struct FlowPredicates {
    /// Container of the target's row: anything with a descendant whose
    /// address attribute carries the target's path.
    pub row_scope: Predicate,
    /// The entry control that opens the per-target flow (kebab).
    pub entry: Predicate,
    /// The destructive item inside the opened menu.
    pub menu_item: Predicate,
    /// The confirmation control on the topmost overlay.
    pub confirm: Predicate,
}

impl FlowPredicates {
    pub fn for_target(target: &Target, profile: &'static LocaleProfile) -> Self {
        let path = target.canonical_url.path().trim_end_matches('/').to_string();
        Self {
            row_scope: Predicate::Has(Box::new(Predicate::attr_contains("href", &path))),
            entry: Predicate::AnyOf(vec![
                Predicate::semantic_attr(HOOK_KEY, ENTRY_HOOK),
                Predicate::IconShape,
            ]),
            menu_item: Predicate::AnyOf(vec![
                Predicate::semantic_attr(HOOK_KEY, DELETE_HOOK),
                Predicate::TextPattern(&profile.menu_item),
            ]),
            confirm: Predicate::AnyOf(vec![
                Predicate::semantic_attr(HOOK_KEY, CONFIRM_HOOK),
                Predicate::TextPattern(&profile.confirm),
            ]),
        }
    }
}

/// Step-scoped reason code for a missing element, named after the control
/// the step was looking for.
fn missing_code(step: &str) -> Option<&'static str> {
    match step {
        "locate_entry" | "open_menu" => Some("kebab_missing"),
        "locate_destructive" | "activate" => Some("delete_missing"),
        "locate_confirm" | "confirm_activate" => Some("confirm_missing"),
        _ => None,
    }
}

fn failed(input: String, target: Target, mut evidence: Vec<StepOutcome>, err: StepError) -> TargetOutcome {
    let step_reason = match (&err.error, missing_code(err.step)) {
        (AutomationError::ElementMissing(_), Some(code)) => code.to_string(),
        (error, _) => error.reason_code().to_string(),
    };
    evidence.push(StepOutcome {
        name: err.step.to_string(),
        ok: false,
        attempt: err.attempt,
        evidence: Some(json!({ "error": err.error.to_string() })),
        reason_code: Some(step_reason),
    });
    info!(
        target = %target.id,
        step = err.step,
        attempt = err.attempt,
        reason = err.error.reason_code(),
        "target pipeline failed"
    );
    TargetOutcome {
        input,
        target: Some(target),
        ok: false,
        step: Some(err.step.to_string()),
        reason_code: Some(err.error.reason_code().to_string()),
        attempt: err.attempt,
        evidence,
    }
}

/// Drive one target from `Init` to its terminal state.
#[instrument(level = "debug", skip_all, fields(target = %target.id))]
pub(crate) async fn run(
    surface: Arc<dyn DocumentSurface>,
    config: Arc<EngineConfig>,
    input: String,
    target: Target,
) -> TargetOutcome {
    let mode = if config.dry_run {
        StepMode::Skip
    } else {
        StepMode::Live
    };
    let mut evidence: Vec<StepOutcome> = Vec::new();

    // Init: bring up the session. The canonical address was validated at
    // parse time; what can still fail here is the session provider itself.
    let session = match surface.ensure_session(&target.canonical_url).await {
        Ok(session) => session,
        Err(error) => {
            return failed(
                input,
                target,
                evidence,
                StepError {
                    step: "init",
                    attempt: 1,
                    error,
                },
            )
        }
    };

    // Profile is resolved once per target and then only read.
    let locale_signals = surface
        .locale_signals(session)
        .await
        .unwrap_or_else(|error| {
            debug!(%error, "locale signals unavailable, using defaults");
            Vec::new()
        });
    let profile = profile::resolve(&locale_signals);

    let ctx = RunContext {
        surface,
        session,
        config: config.clone(),
        profile,
    };
    let runner = StepRunner::new(config);
    let flow = FlowPredicates::for_target(&target, profile);

    // GuardReady: wait for a stable primary layout region, then make sure
    // the document is on the expected host at all.
    let step = runner
        .run("guard", true, mode, |_| {
            let ctx = ctx.clone();
            let expected_host = target.host().to_string();
            async move {
                ctx.surface.wait_ready(ctx.session).await?;
                let location = ctx.surface.location(ctx.session).await?;
                let host = Url::parse(&location)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string));
                if host.as_deref() != Some(expected_host.as_str()) {
                    return Err(AutomationError::HostMismatch(format!(
                        "expected {expected_host}, document is at {location}"
                    )));
                }
                Ok(json!({ "ready": true, "location": location }))
            }
        })
        .await;
    match step {
        Ok(outcome) => evidence.push(outcome),
        Err(err) => return failed(input, target, evidence, err),
    }

    // LocateEntryControl: the kebab inside the target's row.
    let step = runner
        .run("locate_entry", true, mode, |m| {
            let ctx = ctx.clone();
            let flow = flow.clone();
            async move {
                let handle = ctx
                    .locator(flow.entry)
                    .within(flow.row_scope)
                    .with_timeout(ctx.config.lookup_timeout(m.is_skip()))
                    .first()
                    .await?;
                Ok(handle.describe())
            }
        })
        .await;
    match step {
        Ok(outcome) => evidence.push(outcome),
        Err(err) => return failed(input, target, evidence, err),
    }

    // OpenMenu: re-locate (the earlier handle died at the last suspension
    // point) and activate.
    let step = runner
        .run("open_menu", true, mode, |m| {
            let ctx = ctx.clone();
            let flow = flow.clone();
            async move {
                let handle = ctx
                    .locator(flow.entry)
                    .within(flow.row_scope)
                    .with_timeout(ctx.config.lookup_timeout(m.is_skip()))
                    .first()
                    .await?;
                let mut step_evidence = json!({ "control": handle.describe() });
                if !m.is_skip() {
                    executor::activate(&ctx, &handle).await?;
                    step_evidence["activated"] = json!(true);
                }
                Ok(step_evidence)
            }
        })
        .await;
    match step {
        Ok(outcome) => evidence.push(outcome),
        Err(err) => return failed(input, target, evidence, err),
    }

    // LocateDestructiveControl: the localized menu item, document-wide,
    // since menus render in an overlay, not inside the row.
    let step = runner
        .run("locate_destructive", true, mode, |m| {
            let ctx = ctx.clone();
            let flow = flow.clone();
            async move {
                let handle = ctx
                    .locator(flow.menu_item)
                    .with_timeout(ctx.config.lookup_timeout(m.is_skip()))
                    .first()
                    .await?;
                Ok(handle.describe())
            }
        })
        .await;
    match step {
        Ok(outcome) => evidence.push(outcome),
        Err(err) => return failed(input, target, evidence, err),
    }

    // Activate: mutating, so live mode only.
    if !mode.is_skip() {
        let step = runner
            .run("activate", true, StepMode::Live, |_| {
                let ctx = ctx.clone();
                let flow = flow.clone();
                async move {
                    let handle = ctx.locator(flow.menu_item).first().await?;
                    executor::activate(&ctx, &handle).await?;
                    Ok(json!({ "control": handle.describe(), "activated": true }))
                }
            })
            .await;
        match step {
            Ok(outcome) => evidence.push(outcome),
            Err(err) => return failed(input, target, evidence, err),
        }
    }

    // LocateConfirmation: the ranking prefers the topmost overlay when
    // several confirmation surfaces are stacked.
    let step = runner
        .run("locate_confirm", true, mode, |m| {
            let ctx = ctx.clone();
            let flow = flow.clone();
            async move {
                let handle = ctx
                    .locator(flow.confirm)
                    .with_timeout(ctx.config.lookup_timeout(m.is_skip()))
                    .first()
                    .await?;
                Ok(handle.describe())
            }
        })
        .await;
    let confirm_outcome = match step {
        Ok(outcome) => outcome,
        Err(err) => return failed(input, target, evidence, err),
    };
    let confirm_attempt = confirm_outcome.attempt;
    evidence.push(confirm_outcome);

    // In dry-run the pipeline is done once confirmation evidence exists:
    // everything past this point mutates.
    if mode.is_skip() {
        info!(target = %target.id, "dry-run complete, mutation withheld");
        return TargetOutcome {
            input,
            target: Some(target),
            ok: true,
            step: Some("locate_confirm".to_string()),
            reason_code: Some("dry_run".to_string()),
            attempt: confirm_attempt,
            evidence,
        };
    }

    // ConfirmActivate.
    let step = runner
        .run("confirm_activate", true, StepMode::Live, |_| {
            let ctx = ctx.clone();
            let flow = flow.clone();
            async move {
                let handle = ctx.locator(flow.confirm).first().await?;
                executor::activate(&ctx, &handle).await?;
                Ok(json!({ "control": handle.describe(), "activated": true }))
            }
        })
        .await;
    match step {
        Ok(outcome) => evidence.push(outcome),
        Err(err) => return failed(input, target, evidence, err),
    }

    // Verify: not retried, its own polling already covers the deadline.
    let step = runner
        .run("verify", false, StepMode::Live, |_| {
            let ctx = ctx.clone();
            let target = target.clone();
            let flow = flow.clone();
            async move {
                let verification = verify::verify(
                    &ctx,
                    &target,
                    &flow.row_scope,
                    &flow.entry,
                    ctx.config.step_timeout(),
                )
                .await?;
                Ok(json!({
                    "signal": verification.signal.as_str(),
                    "detail": verification.evidence,
                }))
            }
        })
        .await;
    match step {
        Ok(mut outcome) => {
            let signal = outcome
                .evidence
                .as_ref()
                .and_then(|e| e["signal"].as_str())
                .unwrap_or("verified")
                .to_string();
            outcome.reason_code = Some(signal.clone());
            let attempt = outcome.attempt;
            evidence.push(outcome);
            info!(target = %target.id, signal, "target pipeline succeeded");
            TargetOutcome {
                input,
                target: Some(target),
                ok: true,
                step: Some("verify".to_string()),
                reason_code: Some(signal),
                attempt,
                evidence,
            }
        }
        Err(err) => failed(input, target, evidence, err),
    }
}
