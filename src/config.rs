//! Per-stage configuration.

use std::borrow::Cow;
use std::sync::Arc;

use crate::hooks::{self, DropSink};

/// Configuration shared by every subscription of a stage blueprint.
#[derive(Clone)]
pub struct StageConfig {
    /// Name attached to log events and snapshots
    pub name: Cow<'static, str>,
    /// Drop sink override; `None` uses the process-wide sink
    pub drop_sink: Option<Arc<dyn DropSink>>,
}

impl std::fmt::Debug for StageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageConfig")
            .field("name", &self.name)
            .field("drop_sink", &self.drop_sink.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("skip_until"),
            drop_sink: None,
        }
    }
}

impl StageConfig {
    /// Set the stage name
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Route dropped signals of this stage to `sink`
    pub fn with_drop_sink(mut self, sink: Arc<dyn DropSink>) -> Self {
        self.drop_sink = Some(sink);
        self
    }

    /// The drop sink in effect for this stage.
    pub fn drop_sink(&self) -> Arc<dyn DropSink> {
        match &self.drop_sink {
            Some(sink) => Arc::clone(sink),
            None => hooks::global(),
        }
    }
}
