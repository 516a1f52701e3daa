//! Shared utilities

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod config;
pub mod fs;
pub mod process;
pub mod quote;

pub use config::Config;

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
