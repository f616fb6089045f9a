use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Readiness guard failed: {0}")]
    GuardFailed(String),

    #[error("Element not found: {0}")]
    ElementMissing(String),

    #[error("Step failed: {0}")]
    StepFailed(String),

    #[error("No verification signal observed: {0}")]
    VerifyTimeout(String),

    #[error("Document is on an unexpected host: {0}")]
    HostMismatch(String),

    #[error("Capability-scoped call failed: {0}")]
    ExecutionFailed(String),

    #[error("Surface transport error: {0}")]
    SurfaceError(String),

    #[error("Handle is stale (captured in generation {held}, surface is at {current})")]
    StaleHandle { held: u64, current: u64 },

    #[error("Cancelled before target started")]
    Cancelled,
}

impl AutomationError {
    /// Wire-visible reason code for this error, stable across releases.
    ///
    /// These are the codes surfaced in `StepOutcome::reason_code` and
    /// `TargetOutcome::reason_code`, so callers can branch on them without
    /// parsing display strings.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AutomationError::InvalidTarget(_) => "invalid_target",
            AutomationError::GuardFailed(_) => "guard_failed",
            AutomationError::ElementMissing(_) => "element_missing",
            AutomationError::StepFailed(_) => "step_failed",
            AutomationError::VerifyTimeout(_) => "verify_timeout",
            AutomationError::HostMismatch(_) => "host_mismatch",
            AutomationError::ExecutionFailed(_) => "execution_exception",
            AutomationError::SurfaceError(_) => "surface_error",
            AutomationError::StaleHandle { .. } => "stale_handle",
            AutomationError::Cancelled => "cancelled",
        }
    }
}
