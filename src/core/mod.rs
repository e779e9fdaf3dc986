//! Portfolio valuation and transfer engine

pub mod balance;
pub mod cache;
pub mod config;
pub mod error;
pub mod insights;
pub mod log;
pub mod model;
pub mod percentage;
pub mod ports;
pub mod service;
pub mod transfer;

// Re-export main types for cleaner imports
pub use error::{EngineError, Result};
pub use model::{Holding, InsightRow, MultiCurrencyBalance, Platform, PriceSnapshot};
pub use ports::{
    CacheInvalidator, CacheScope, HoldingsBatch, HoldingsStore, PlatformDirectory,
    PriceSnapshotProvider,
};
