pub mod caching;
pub mod coingecko;
pub mod directory;
pub mod static_prices;
pub mod util;

// Re-export traits for providers to easily use cache
pub use crate::core::cache::Cache;
pub use crate::store::memory::MemoryCache;
