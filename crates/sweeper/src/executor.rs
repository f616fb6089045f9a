//! Synthetic activation of located controls.

use crate::context::RunContext;
use crate::element::ElementHandle;
use crate::errors::AutomationError;
use crate::surface::SyntheticInput;
use tracing::{debug, instrument};

/// Activate a control through its native handlers.
///
/// Dispatches focus (best-effort), hover entry, then the full
/// pointer-down → pointer-up → click sequence as discrete events, so
/// whatever handlers the document attached fire exactly as they would for a
/// real input device. Never fails silently: a vanished or stale node
/// surfaces as an error. Verifying the *effect* of the activation is the
/// verification engine's job, not this one's.
#[instrument(level = "debug", skip(ctx, handle), fields(node = %handle.node))]
pub async fn activate(ctx: &RunContext, handle: &ElementHandle) -> Result<(), AutomationError> {
    let target = handle.node_ref();

    if let Err(e) = ctx
        .surface
        .dispatch(ctx.session, target, SyntheticInput::Focus)
        .await
    {
        debug!(error = %e, "focus dispatch failed, continuing without it");
    }

    for input in [
        SyntheticInput::HoverEnter,
        SyntheticInput::PointerDown,
        SyntheticInput::PointerUp,
        SyntheticInput::Click,
    ] {
        ctx.surface.dispatch(ctx.session, target, input).await?;
    }

    Ok(())
}
