//! Error types for rs-hackrf operations.

use nusb::transfer::TransferError;
use thiserror::Error;

use crate::control::Request;

/// Result type for rs-hackrf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error codes matching libhackrf enum values (for cross-compatibility).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    /// Operation successful.
    Success = 0,
    /// True (for boolean returns).
    True = 1,
    /// Parameter invalid.
    InvalidParam = -2,
    /// No HackRF device found.
    NotFound = -5,
    /// Device is busy.
    Busy = -6,
    /// Out of memory.
    NoMem = -11,
    /// USB layer error.
    Libusb = -1000,
    /// Thread error.
    Thread = -1001,
    /// Streaming thread error.
    StreamingThreadErr = -1002,
    /// Streaming stopped.
    StreamingStopped = -1003,
    /// Streaming exit called.
    StreamingExitCalled = -1004,
    /// Firmware USB API too old for the request.
    UsbApiVersion = -1005,
    /// Not the last device.
    NotLastDevice = -2000,
    /// Other error.
    Other = -9999,
}

impl ErrorCode {
    /// Get a human-readable name for the error code.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::Success => "HACKRF_SUCCESS",
            ErrorCode::True => "HACKRF_TRUE",
            ErrorCode::InvalidParam => "HACKRF_ERROR_INVALID_PARAM",
            ErrorCode::NotFound => "HACKRF_ERROR_NOT_FOUND",
            ErrorCode::Busy => "HACKRF_ERROR_BUSY",
            ErrorCode::NoMem => "HACKRF_ERROR_NO_MEM",
            ErrorCode::Libusb => "HACKRF_ERROR_LIBUSB",
            ErrorCode::Thread => "HACKRF_ERROR_THREAD",
            ErrorCode::StreamingThreadErr => "HACKRF_ERROR_STREAMING_THREAD_ERR",
            ErrorCode::StreamingStopped => "HACKRF_ERROR_STREAMING_STOPPED",
            ErrorCode::StreamingExitCalled => "HACKRF_ERROR_STREAMING_EXIT_CALLED",
            ErrorCode::UsbApiVersion => "HACKRF_ERROR_USB_API_VERSION",
            ErrorCode::NotLastDevice => "HACKRF_ERROR_NOT_LAST_DEVICE",
            ErrorCode::Other => "HACKRF_ERROR_OTHER",
        }
    }
}

/// Errors that can occur during HackRF operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value failed validation. No I/O was performed.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A stream or firmware upload is already active on the session.
    #[error("Device busy: a stream or firmware upload is already active")]
    Busy,

    /// The firmware's USB API is older than the operation requires.
    #[error("USB API version {actual:#06x} is too old (requires {required:#06x})")]
    ApiVersionUnsupported { required: u16, actual: u16 },

    /// Control transfer failed.
    #[error("Control transfer {request:?} failed: {source}")]
    Control {
        request: Request,
        #[source]
        source: TransferError,
    },

    /// Bulk transfer failed while streaming.
    #[error("Bulk transfer failed: {0}")]
    Transfer(#[source] TransferError),

    /// USB operation failed (open, claim, enumerate).
    #[error("USB error: {0}")]
    Usb(#[from] std::io::Error),

    /// No HackRF device found.
    #[error("No HackRF device found")]
    NotFound,

    /// Invalid response from device.
    #[error("Invalid device response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Create an invalid parameter error with a custom message
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// The stable numeric code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidParameter(_) => ErrorCode::InvalidParam,
            Error::Busy => ErrorCode::Busy,
            Error::ApiVersionUnsupported { .. } => ErrorCode::UsbApiVersion,
            Error::Control { .. } | Error::Transfer(_) | Error::Usb(_) => ErrorCode::Libusb,
            Error::NotFound => ErrorCode::NotFound,
            Error::InvalidResponse(_) => ErrorCode::Other,
        }
    }
}
