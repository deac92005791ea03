// kv-common - shared error types for the key-value store workspace.

pub mod error;

pub use error::{StoreError, StoreResult, WalRecordError};
