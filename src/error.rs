use std::io;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error reported by PDFium itself, decoded from `FPDF_GetLastError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PdfiumError {
    #[error("unknown error")]
    Unknown,
    #[error("file access error")]
    File,
    #[error("data format error")]
    Format,
    #[error("incorrect password")]
    Password,
    #[error("unsupported security scheme")]
    Security,
    #[error("page not found or content error")]
    Page,
    #[error("unexpected error code {0}")]
    Unexpected(u32),
}

impl PdfiumError {
    pub(crate) fn from_last_error(code: u32) -> Self {
        match code {
            1 => Self::Unknown,
            2 => Self::File,
            3 => Self::Format,
            4 => Self::Password,
            5 => Self::Security,
            6 => Self::Page,
            other => Self::Unexpected(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The guest allocator returned a null pointer.
    #[error("guest allocation of {size} bytes failed")]
    AllocationFailed { size: u64 },

    #[error("guest memory write rejected at {offset:#x} (+{len} bytes)")]
    MemoryWriteRejected { offset: u64, len: usize },

    #[error("guest memory read rejected at {offset:#x} (+{len} bytes)")]
    MemoryReadRejected { offset: u64, len: usize },

    /// Bytes came out of guest memory but did not decode as the
    /// expected shape (odd-length wide string, short scalar, ...).
    #[error("could not decode {0} from guest memory")]
    DecodeFailed(&'static str),

    /// The token does not resolve in its category map, either because it
    /// was never issued by this instance or because it was closed.
    #[error("unknown or closed {category} reference")]
    HandleNotFound { category: &'static str },

    /// The runtime failed to invoke the guest function at all (trap,
    /// argument mismatch, exhausted fuel, ...).
    #[error("guest call {name} failed")]
    GuestCall {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The guest function ran but signaled failure through its return
    /// value, with no more specific error code to report.
    #[error("guest function {0} signaled failure")]
    GuestFailure(&'static str),

    /// Failure with an accompanying PDFium error code.
    #[error("pdfium error: {0}")]
    Pdfium(#[source] PdfiumError),

    /// The loaded module does not export this function. PDFium
    /// WebAssembly builds vary in the API surface they compile in.
    #[error("{0} is not exported by this PDFium build")]
    Unsupported(String),

    #[error("instance is closed")]
    InstanceClosed,

    #[error("could not set up the WebAssembly instance")]
    Instantiate(#[source] anyhow::Error),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn is_password_error(&self) -> bool {
        matches!(self, Self::Pdfium(PdfiumError::Password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_error_codes_map_to_variants() {
        assert_eq!(PdfiumError::from_last_error(4), PdfiumError::Password);
        assert_eq!(PdfiumError::from_last_error(6), PdfiumError::Page);
        assert_eq!(PdfiumError::from_last_error(42), PdfiumError::Unexpected(42));
    }

    #[test]
    fn password_predicate() {
        assert!(Error::Pdfium(PdfiumError::Password).is_password_error());
        assert!(!Error::InstanceClosed.is_password_error());
    }
}
