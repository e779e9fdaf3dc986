//! Terminal rendering of portfolio views and write commands

pub mod holdings;
pub mod insights;
pub mod setup;
pub mod transfer;
pub mod ui;
