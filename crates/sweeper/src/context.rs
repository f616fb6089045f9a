//! Explicit per-target context.
//!
//! Everything a pipeline run needs (surface, session, configuration,
//! resolved locale profile) travels in one value threaded through every
//! call. There is no ambient "current profile" or "current settings"
//! anywhere in the engine.

use crate::errors::AutomationError;
use crate::locator::Locator;
use crate::profile::LocaleProfile;
use crate::selector::Predicate;
use crate::snapshot::DocumentSnapshot;
use crate::surface::{DocumentSurface, SessionId};
use crate::types::EngineConfig;
use std::sync::Arc;

/// Context for one target's pipeline. Read-only for the duration of the run.
#[derive(Clone)]
pub struct RunContext {
    pub surface: Arc<dyn DocumentSurface>,
    pub session: SessionId,
    pub config: Arc<EngineConfig>,
    /// Resolved once per target, before the first step, then only read.
    pub profile: &'static LocaleProfile,
}

impl RunContext {
    /// Start building a locator for `predicate` in this context.
    pub fn locator(&self, predicate: Predicate) -> Locator<'_> {
        Locator::new(self, predicate)
    }

    /// Capture a fresh snapshot of the session's document.
    pub async fn capture(&self) -> Result<DocumentSnapshot, AutomationError> {
        self.surface.capture(self.session).await
    }
}
