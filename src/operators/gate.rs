//! Per-subscription state of a gated stage.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::core::{Phase, Subscription};

/// The single upstream handle of a subscription.
///
/// Shared between the stage (which binds it) and the handle given to the
/// downstream (which requests and cancels through it from its own thread).
/// Requests and cancels made before the upstream is bound are held in
/// `early` and handed over by [`bind`](Self::bind). Binding and recording
/// both happen under that lock, so every early signal is either recorded
/// or sees the bound upstream.
#[derive(Default)]
pub(crate) struct UpstreamSlot {
    subscription: OnceLock<Arc<dyn Subscription>>,
    early: Mutex<Early>,
}

#[derive(Debug, Default)]
struct Early {
    cancelled: bool,
    requests: Vec<u64>,
}

/// What the downstream did before the upstream was bound.
#[derive(Debug)]
pub(crate) struct Binding {
    pub(crate) cancelled: bool,
    /// Requests in arrival order, to be forwarded unchanged
    pub(crate) requests: Vec<u64>,
}

impl UpstreamSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Early> {
        self.early.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind the upstream. Hands the subscription back if one is already bound.
    pub(crate) fn bind(
        &self,
        subscription: Arc<dyn Subscription>,
    ) -> Result<Binding, Arc<dyn Subscription>> {
        let mut early = self.lock();
        self.subscription.set(subscription)?;
        Ok(Binding {
            cancelled: early.cancelled,
            requests: std::mem::take(&mut early.requests),
        })
    }

    pub(crate) fn get(&self) -> Option<&Arc<dyn Subscription>> {
        self.subscription.get()
    }

    /// Forward `n` upstream, or hold it until one is bound.
    pub(crate) fn request(&self, n: u64) {
        if let Some(upstream) = self.subscription.get() {
            upstream.request(n);
            return;
        }
        let upstream = {
            let mut early = self.lock();
            match self.subscription.get() {
                Some(upstream) => Arc::clone(upstream),
                None => {
                    early.requests.push(n);
                    return;
                }
            }
        };
        upstream.request(n);
    }

    /// Cancel the upstream, or remember to do so once one is bound.
    pub(crate) fn cancel(&self) {
        let upstream = {
            let mut early = self.lock();
            early.cancelled = true;
            self.subscription.get().cloned()
        };
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }
}

impl std::fmt::Debug for UpstreamSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamSlot")
            .field("bound", &self.subscription.get().is_some())
            .field("early", &*self.lock())
            .finish()
    }
}

/// Gate and termination latches. Both only ever go from `false` to `true`.
///
/// Only the serial signal path touches these flags, so they are plain bools.
#[derive(Debug)]
pub(crate) struct GateState {
    pub(crate) upstream: Arc<UpstreamSlot>,
    terminal: bool,
    gate_open: bool,
}

impl GateState {
    pub(crate) fn new() -> Self {
        Self {
            upstream: Arc::new(UpstreamSlot::new()),
            terminal: false,
            gate_open: false,
        }
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Latch termination. Returns `false` if already terminal.
    pub(crate) fn terminate(&mut self) -> bool {
        !std::mem::replace(&mut self.terminal, true)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.gate_open
    }

    pub(crate) fn open(&mut self) {
        self.gate_open = true;
    }

    pub(crate) fn phase(&self) -> Phase {
        if self.terminal {
            Phase::Terminal
        } else if self.upstream.get().is_none() {
            Phase::Unsubscribed
        } else if self.gate_open {
            Phase::GateOpen
        } else {
            Phase::GateClosed
        }
    }
}
