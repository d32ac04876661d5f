//! Concrete implementations of the ports.

pub mod close_csv;
pub mod file_config_adapter;
#[cfg(feature = "postgres")]
pub mod postgres_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod yahoo_adapter;
