//! Compile context and placeholder expansion.
//!
//! A [`CompileContext`] is passed down through every compile call. It carries
//! a cancellation flag that evaluators check at search boundaries and before
//! each placeholder expansion; once cancelled, the current rule's compilation
//! aborts with [`TranspileError::Cancelled`] and no partial query is returned.

use crate::error::{Result, TranspileError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation-aware context threaded through rule compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    cancelled: Arc<AtomicBool>,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that can cancel this context from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Errors with [`TranspileError::Cancelled`] if the context was cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TranspileError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Cancels the [`CompileContext`] it was created from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Expands `%placeholder%` values that appear in rule field matchers.
///
/// The expander is injected at evaluator construction and may perform I/O
/// (for example a lookup service call). It is invoked synchronously once per
/// placeholder occurrence. If no expander is configured and a rule contains a
/// placeholder value, compilation of the affected condition fails with
/// [`TranspileError::PlaceholderExpansion`].
pub trait PlaceholderExpander: Send + Sync {
    /// Expand `name` (without the surrounding `%` markers) into the concrete
    /// values it stands for.
    fn expand(&self, ctx: &CompileContext, name: &str) -> Result<Vec<String>>;
}

impl<F> PlaceholderExpander for F
where
    F: Fn(&CompileContext, &str) -> Result<Vec<String>> + Send + Sync,
{
    fn expand(&self, ctx: &CompileContext, name: &str) -> Result<Vec<String>> {
        self(ctx, name)
    }
}
