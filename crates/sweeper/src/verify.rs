//! Inference of the destructive effect.
//!
//! Success cannot be observed directly, so this engine polls for the first
//! of several independent signals inside a deadline. Which signal fired is
//! recorded, since diagnosing a batch later depends on it.

use crate::context::RunContext;
use crate::errors::AutomationError;
use crate::selector::Predicate;
use crate::types::Target;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// One of the independent observations that imply the intended effect
/// occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySignal {
    /// The current location no longer addresses the target.
    UrlChanged,
    /// The control that triggered the flow is gone from the document.
    EntryGone,
    /// A localized success message appeared.
    SuccessToast,
}

impl VerifySignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifySignal::UrlChanged => "url_changed",
            VerifySignal::EntryGone => "entry_gone",
            VerifySignal::SuccessToast => "toast_seen",
        }
    }
}

/// A positive verification: the signal that fired, plus evidence.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub signal: VerifySignal,
    pub evidence: serde_json::Value,
}

/// Poll until one of the success signals fires or the deadline elapses.
///
/// Signals are evaluated in a fixed order within each iteration (address,
/// then entry control, then toast); across iterations the first one
/// observed wins.
#[instrument(level = "debug", skip_all, fields(target = %target.id))]
pub async fn verify(
    ctx: &RunContext,
    target: &Target,
    row_scope: &Predicate,
    entry: &Predicate,
    timeout: Duration,
) -> Result<Verification, AutomationError> {
    let poll = ctx.config.poll_interval();
    let deadline = Instant::now() + timeout;

    loop {
        let location = ctx.surface.location(ctx.session).await?;
        if !target.matches_location(&location) {
            debug!(%location, "verified: address no longer matches target");
            return Ok(Verification {
                signal: VerifySignal::UrlChanged,
                evidence: json!({ "signal": "url_changed", "location": location }),
            });
        }

        let snapshot = ctx.capture().await?;

        let entry_present = !ctx
            .locator(entry.clone())
            .within(row_scope.clone())
            .all_in(&snapshot)
            .is_empty();
        if !entry_present {
            debug!("verified: entry control disappeared");
            return Ok(Verification {
                signal: VerifySignal::EntryGone,
                evidence: json!({ "signal": "entry_gone" }),
            });
        }

        let toast = snapshot.root.descendants().find(|node| {
            if !node.is_visible() {
                return false;
            }
            let own_text = node.text.as_deref().unwrap_or_default();
            let name = node.name.as_deref().unwrap_or_default();
            ctx.profile.success.matches_text(own_text) || ctx.profile.success.matches_text(name)
        });
        if let Some(node) = toast {
            debug!(node = %node.node, "verified: success message appeared");
            return Ok(Verification {
                signal: VerifySignal::SuccessToast,
                evidence: json!({
                    "signal": "toast_seen",
                    "text": node.text.clone().or_else(|| node.name.clone()),
                }),
            });
        }

        if Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(poll).await;
    }

    Err(AutomationError::VerifyTimeout(format!(
        "no verification signal within {timeout:?}"
    )))
}
