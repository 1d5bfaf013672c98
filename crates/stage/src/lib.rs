pub mod batcher;
pub mod bulk_insert;
pub mod config;
pub mod destination;
pub mod error;
pub mod loader;
pub mod rows;

#[cfg(test)]
mod tests;

pub use bulk_insert::BulkInsertStage;
pub use config::StageConfig;
