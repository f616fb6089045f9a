//! The boundary between the engine and the hosting surface.
//!
//! Everything the engine knows about the live document arrives through
//! [`DocumentSurface`]: a request/response contract over which plain values
//! are marshalled. The engine must not assume shared memory on the other
//! side: a capture is a copy, and a dispatch is a message naming a node by
//! its ephemeral id and generation.

use crate::errors::AutomationError;
use crate::snapshot::{DocumentSnapshot, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// Identifier of one hosting session (tab, view, or window).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a node captured in a specific generation.
///
/// Dispatching against a generation older than the surface's current one is
/// rejected with [`AutomationError::StaleHandle`]: the document may have
/// fully re-rendered since the capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub node: NodeId,
    pub generation: u64,
}

/// One synthetic input event, dispatched so the document's native handlers
/// fire exactly as they would for a real input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticInput {
    Focus,
    HoverEnter,
    PointerDown,
    PointerUp,
    Click,
}

/// The common trait all hosting surfaces must implement.
///
/// Implementations wrap whatever actually talks to the document: an
/// extension bridge, a devtools connection, a test double. The engine only
/// ever calls these five operations.
#[async_trait::async_trait]
pub trait DocumentSurface: Send + Sync {
    /// Find or create a session displaying `url`, resolved once the initial
    /// load has finished.
    async fn ensure_session(&self, url: &Url) -> Result<SessionId, AutomationError>;

    /// Readiness guard: resolves once the hosting document has a stable
    /// primary layout region, or rejects with a reason.
    async fn wait_ready(&self, session: SessionId) -> Result<(), AutomationError>;

    /// Current address of the session's document.
    async fn location(&self, session: SessionId) -> Result<String, AutomationError>;

    /// Ordered lowercase locale tags for the session, document-declared
    /// language first, platform-reported languages after.
    async fn locale_signals(&self, session: SessionId) -> Result<Vec<String>, AutomationError>;

    /// Capture the rendered tree. Advances the surface's generation.
    async fn capture(&self, session: SessionId) -> Result<DocumentSnapshot, AutomationError>;

    /// Dispatch one synthetic input against a captured node.
    async fn dispatch(
        &self,
        session: SessionId,
        target: NodeRef,
        input: SyntheticInput,
    ) -> Result<(), AutomationError>;
}
