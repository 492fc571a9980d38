//! Error types for add-in authors

use thiserror::Error;

use crate::ffi::AddinStatus;

/// Errors returned by the add-in side [`Host`](crate::Host) wrapper
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostCallError {
    /// `_addin_init` has not run yet, so there is no host to call
    #[error("Add-in has not been initialized by the host")]
    NotInitialized,

    /// The host returned a non-zero status
    #[error("Host call failed: {0:?}")]
    Status(AddinStatus),
}

impl HostCallError {
    /// Map a host status code to a result
    pub fn check(code: i32) -> Result<(), Self> {
        match AddinStatus::from_code(code) {
            AddinStatus::Ok => Ok(()),
            status => Err(Self::Status(status)),
        }
    }
}
