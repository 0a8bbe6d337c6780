//! Transfer error types.

use hyper::StatusCode;
use thiserror::Error;

/// Errors raised while resolving, validating or streaming a file transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    IoFault(#[from] std::io::Error),

    #[error("invalid range")]
    MalformedRange,

    #[error("invalid range: failed to overlap")]
    RangeNotSatisfiable,

    /// Transfer stopped early. Reported by the producer, never sent to a
    /// client.
    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// Map the error to the status line used when nothing has been sent yet.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRange | Self::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::NotFound(_) | Self::IoFault(_) | Self::Cancelled => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Classify an `io::Error` raised while resolving `path`.
    pub fn from_io(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::IoFault(err)
        }
    }
}

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors raised while receiving a multipart upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request body exceeds the {0} byte upload limit")]
    TooLarge(u64),

    #[error("no file field in upload")]
    MissingFile,

    #[error("multipart error: {0}")]
    Multipart(#[from] multer::Error),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl UploadError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        Self::Transfer(TransferError::IoFault(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            TransferError::MalformedRange.status_code(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            TransferError::RangeNotSatisfiable.status_code(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
        assert_eq!(
            TransferError::NotFound("a.txt".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_from_io_classifies_missing_files() {
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(matches!(
            TransferError::from_io("x", missing),
            TransferError::NotFound(p) if p == "x"
        ));

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            TransferError::from_io("x", denied),
            TransferError::IoFault(_)
        ));
    }

    #[test]
    fn test_upload_status_mapping() {
        assert_eq!(
            UploadError::TooLarge(10).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            UploadError::MissingFile.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let io = UploadError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(matches!(io, UploadError::Transfer(TransferError::IoFault(_))));
    }
}
