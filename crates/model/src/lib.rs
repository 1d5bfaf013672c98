pub mod core;
pub mod mapping;
