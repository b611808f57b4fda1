//! Read-only introspection for tracing and monitoring tools.
//!
//! Nothing in a stage's own control logic reads these accessors.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::core::Subscription;

/// Lifecycle phase of a gated stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// No upstream has been bound yet
    Unsubscribed,
    /// Subscribed, still filtering
    GateClosed,
    /// Subscribed, passing everything through
    GateOpen,
    /// Completed, failed or cancelled before subscription; absorbing
    Terminal,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Unsubscribed => "unsubscribed",
            Phase::GateClosed => "gate-closed",
            Phase::GateOpen => "gate-open",
            Phase::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a stage, suitable for export.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageSnapshot {
    pub name: Cow<'static, str>,
    pub phase: Phase,
    pub started: bool,
    pub terminated: bool,
}

/// Capability implemented by stages that expose their wiring.
pub trait Introspect {
    /// The downstream subscriber type
    type Downstream: ?Sized;
    /// The user-supplied input bound into the stage (e.g. a predicate)
    type Input: ?Sized;

    /// Subscribed and not yet terminated.
    fn is_started(&self) -> bool;

    fn is_terminated(&self) -> bool;

    fn downstream(&self) -> &Self::Downstream;

    fn upstream(&self) -> Option<Arc<dyn Subscription>>;

    fn connected_input(&self) -> &Self::Input;

    fn snapshot(&self) -> StageSnapshot;
}
