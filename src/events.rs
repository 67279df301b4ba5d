//! Event system for pipeline lifecycle hooks.
//!
//! Provides an optional, non-intrusive way to observe a document request.
//! The orchestrator and strategies emit events when chunking finishes, a
//! strategy is chosen, and each map/reduce call starts or ends. Users can
//! implement [`EventHandler`] to receive these events for progress bars or
//! audit logs. Events never influence the result.

use crate::selector::TaskKind;
use std::sync::Arc;

/// Events emitted while processing one document.
#[derive(Debug, Clone)]
pub enum Event {
    /// The document was split into chunks.
    Chunked {
        /// Number of chunks produced.
        chunks: usize,
        /// Configured maximum chunk size in characters.
        max_chunk_size: usize,
    },
    /// The selector picked a strategy for the instruction.
    StrategySelected {
        /// The chosen strategy.
        kind: TaskKind,
    },
    /// A map-phase call for one chunk is starting.
    MapStart {
        /// 0-based chunk index.
        index: usize,
        /// Total number of chunks.
        total: usize,
    },
    /// A map-phase call for one chunk has finished.
    MapEnd {
        /// 0-based chunk index.
        index: usize,
        /// Whether the call succeeded.
        ok: bool,
    },
    /// The single reduce call is starting.
    ReduceStart {
        /// Number of intermediate summaries being combined.
        summaries: usize,
    },
    /// The reduce call has finished.
    ReduceEnd {
        /// Whether the call succeeded.
        ok: bool,
    },
    /// A transport-level retry due to an HTTP error.
    TransportRetry {
        /// Client name.
        name: String,
        /// The retry attempt number (1-indexed).
        attempt: u32,
        /// Delay before this retry attempt in milliseconds.
        delay_ms: u64,
        /// Reason for the retry (error description).
        reason: String,
    },
}

/// Handler for pipeline lifecycle events.
///
/// Handlers may be called from several map-phase futures of the same
/// request, so they must be `Send + Sync`. `MapEnd` events can arrive out of
/// chunk order; the result itself is always reassembled in order.
///
/// # Example
///
/// ```
/// use doc_processor::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::MapStart { index, total } => println!("[map] {}/{}", index + 1, total),
///             Event::ReduceStart { summaries } => println!("[reduce] {} summaries", summaries),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the pipeline emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// ```
/// use doc_processor::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::Chunked { chunks, .. } = event {
///         println!("{} chunks", chunks);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
