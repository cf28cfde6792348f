pub mod lru;
pub mod registry;

pub use lru::BoundedLru;
pub use registry::{CacheHandle, CacheRegistry, CacheStats};
