//! # Translators
//!
//! A translator turns a change applied on one surface into equivalent
//! changes for other surfaces (vector tracing, pattern recognition, code
//! synthesis). Translators are read-only with respect to surface state; the
//! engine re-submits their output through the queue, where the loop guard
//! bounds echo cycles.
//!
//! A failing translator is isolated: the error is logged and counted, the
//! batch continues and the original change stays applied.

use crate::shared::change::Change;
use crate::shared::error::SyncError;

pub trait Translator: Send + Sync {
    fn name(&self) -> &str;

    /// Changes to submit on other surfaces in response to `change`
    fn translate(&self, change: &Change) -> Result<Vec<Change>, SyncError>;
}

/// Translator backed by a closure
pub struct FnTranslator<F> {
    name: String,
    translate: F,
}

impl<F> FnTranslator<F>
where
    F: Fn(&Change) -> Result<Vec<Change>, SyncError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, translate: F) -> Self {
        Self {
            name: name.into(),
            translate,
        }
    }
}

impl<F> Translator for FnTranslator<F>
where
    F: Fn(&Change) -> Result<Vec<Change>, SyncError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn translate(&self, change: &Change) -> Result<Vec<Change>, SyncError> {
        (self.translate)(change)
    }
}

impl<F> std::fmt::Debug for FnTranslator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTranslator").field("name", &self.name).finish()
    }
}
