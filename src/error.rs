//! Defines the [`Error`] type used throughout the library.

use core::fmt;
use std::{ffi::c_int, io};

use nix::errno::Errno;

ffi_enum! {
    /// A VA-API status code, as returned to the client through the dispatch table.
    pub enum VAStatus: c_int {
        SUCCESS                        = 0x00000000,
        // Other allowed values are in `VAError`.
    }
}

ffi_enum! {
    /// An error code reported to the client.
    pub enum VAError: c_int {
        ERROR_OPERATION_FAILED         = 0x00000001,
        ERROR_ALLOCATION_FAILED        = 0x00000002,
        ERROR_INVALID_DISPLAY          = 0x00000003,
        ERROR_INVALID_CONFIG           = 0x00000004,
        ERROR_INVALID_CONTEXT          = 0x00000005,
        ERROR_INVALID_SURFACE          = 0x00000006,
        ERROR_INVALID_BUFFER           = 0x00000007,
        ERROR_MAX_NUM_EXCEEDED         = 0x0000000b,
        ERROR_UNSUPPORTED_PROFILE      = 0x0000000c,
        ERROR_UNSUPPORTED_ENTRYPOINT   = 0x0000000d,
        ERROR_UNSUPPORTED_RT_FORMAT    = 0x0000000e,
        ERROR_UNSUPPORTED_BUFFERTYPE   = 0x0000000f,
        ERROR_SURFACE_BUSY             = 0x00000010,
        ERROR_INVALID_PARAMETER        = 0x00000012,
        ERROR_RESOLUTION_NOT_SUPPORTED = 0x00000013,
        ERROR_DECODING_ERROR           = 0x00000017,
        ERROR_NOT_ENOUGH_BUFFER        = 0x00000025,
        #[allow(overflowing_literals)]
        ERROR_UNKNOWN                  = 0xFFFFFFFF,
    }
}

impl From<VAError> for VAStatus {
    #[inline]
    fn from(e: VAError) -> Self {
        Self(e.0)
    }
}

impl<T> From<&Result<T, Error>> for VAStatus {
    fn from(res: &Result<T, Error>) -> Self {
        match res {
            Ok(_) => VAStatus::SUCCESS,
            Err(e) => e.status().into(),
        }
    }
}

impl PartialEq<VAError> for VAStatus {
    #[inline]
    fn eq(&self, other: &VAError) -> bool {
        self.0 == other.0
    }
}

impl PartialEq<VAStatus> for VAError {
    #[inline]
    fn eq(&self, other: &VAStatus) -> bool {
        self.0 == other.0
    }
}

pub(crate) enum Repr {
    Va(VAError),
    Device { op: &'static str, errno: Errno },
    Backend { op: &'static str, message: String },
    Io(io::Error),
}

impl From<VAError> for Repr {
    fn from(v: VAError) -> Self {
        Self::Va(v)
    }
}

impl From<io::Error> for Repr {
    fn from(v: io::Error) -> Self {
        Self::Io(v)
    }
}

/// The main error type used by this library.
pub struct Error {
    repr: Repr,
}

impl Error {
    pub(crate) fn from(e: impl Into<Repr>) -> Self {
        Self { repr: e.into() }
    }

    /// Creates an [`Error`] for a failed device operation (an ioctl, usually).
    pub fn device(op: &'static str, errno: Errno) -> Self {
        Self {
            repr: Repr::Device { op, errno },
        }
    }

    /// Creates an [`Error`] for a device operation that failed with a typed error of the
    /// underlying V4L2 library.
    pub fn backend(op: &'static str, error: impl fmt::Display) -> Self {
        Self {
            repr: Repr::Backend {
                op,
                message: error.to_string(),
            },
        }
    }

    /// Returns the status code that should be reported to the client for this [`Error`].
    ///
    /// Device failures are reported as [`VAError::ERROR_UNKNOWN`].
    pub fn status(&self) -> VAError {
        match &self.repr {
            Repr::Va(e) => *e,
            Repr::Device { .. } | Repr::Backend { .. } => VAError::ERROR_UNKNOWN,
            Repr::Io(_) => VAError::ERROR_OPERATION_FAILED,
        }
    }

    /// If this [`Error`] was caused by a failing device operation, returns the `errno` value.
    pub fn errno(&self) -> Option<Errno> {
        match &self.repr {
            Repr::Device { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Va(e) => e.fmt(f),
            Repr::Device { op, errno } => write!(f, "{op}: {errno:?}"),
            Repr::Backend { op, message } => write!(f, "{op}: {message:?}"),
            Repr::Io(e) => e.fmt(f),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Va(e) => fmt::Debug::fmt(e, f),
            Repr::Device { op, errno } => write!(f, "{op} failed: {}", errno.desc()),
            Repr::Backend { op, message } => write!(f, "{op} failed: {message}"),
            Repr::Io(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {}
