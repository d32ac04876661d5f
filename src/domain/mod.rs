//! Core domain types and synchronization logic.

pub mod error;
pub mod observation;
pub mod sync;
pub mod sync_request;
