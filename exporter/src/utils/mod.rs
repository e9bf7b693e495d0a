//! Utility modules for Tasksheet.
//!
//! # Modules
//!
//! - [`debounce`]: Coalescing bursts of file-change notifications

pub mod debounce;

pub use debounce::{Debouncer, DebouncerError};
