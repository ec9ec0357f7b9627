pub mod binary_resolver;
pub mod clock;
pub mod config;
