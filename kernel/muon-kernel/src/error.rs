//! Service errors.

use thiserror::Error;

/// Why a service refused a request.
///
/// Device failures are not errors at this level: the operation was
/// attempted, and its device status travels back through the status
/// out-parameter instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// An argument was out of range. The request had no side effects.
    #[error("invalid argument")]
    InvalidArgument,
}

/// Result alias for the service routines.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// The integer result code a service outcome marshals to.
pub fn code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(ServiceError::InvalidArgument) => -1,
    }
}
