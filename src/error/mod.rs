//! Error Handling Module
//!
//! One error enum for the whole SDK. Compilation and signing failures are
//! raised synchronously at the call site; nothing here retries or swallows.

mod types;

pub use types::*;
