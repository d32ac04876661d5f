//! closecache: a read-through cache of daily closing prices.
//!
//! Hexagonal architecture: the synchronization logic lives in [`domain`], the
//! store and fetcher traits it depends on in [`ports`], and the SQLite,
//! PostgreSQL, Yahoo and INI implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
