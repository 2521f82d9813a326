//! The three AI text operations routed by the service: summarization,
//! translation, classification.
//!
//! Each operation implements [`TaskOp`](aqueduct_core::TaskOp) over an
//! abstract [`ChatClient`](aqueduct_core::ChatClient) and is meant to be
//! composed with the resilience wrappers:
//!
//! ```rust,ignore
//! let op = CachedOp::new(
//!     Arc::new(RetryingOp::new(Arc::new(ClassifyOp::new(client)), policy)),
//!     cache,
//! );
//! ```

mod classify;
mod scripted;
mod summarize;
mod translate;

pub use classify::ClassifyOp;
pub use scripted::ScriptedChatClient;
pub use summarize::SummarizeOp;
pub use translate::TranslateOp;
