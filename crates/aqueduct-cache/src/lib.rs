mod cached_op;
mod in_memory;
mod key;

pub use cached_op::{CachedOp, DEFAULT_TTL};
pub use in_memory::InMemoryCache;
pub use key::cache_key;

// Re-export core traits for convenience.
pub use aqueduct_core::{CacheHealth, TaskCache};
