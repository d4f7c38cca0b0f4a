use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use color_eyre::Report;

use crate::error_code::ErrorCode;

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    pub(crate) fn kind(&self) -> Option<&UploadError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    UploadError: From<T>,
{
    #[track_caller]
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(UploadError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadError {
    #[error("Couldn't upload file")]
    Upload(#[from] actix_form_data::Error),

    #[error("Error reading request payload")]
    Payload(#[from] actix_web::error::PayloadError),

    #[error("Error in DB")]
    Repo(#[from] crate::repo::RepoError),

    #[error("Error in store")]
    Store(#[from] crate::store::StoreError),

    #[error("Error interacting with filesystem")]
    Io(#[from] std::io::Error),

    #[error("Error importing image")]
    Import(#[from] crate::import::ImportError),

    #[error(transparent)]
    Format(#[from] crate::formats::UnsupportedFormat),

    #[error(transparent)]
    Quota(#[from] crate::quota::QuotaError),

    #[error(transparent)]
    Batch(#[from] crate::upload::BatchError),

    #[error("Failed to acquire the semaphore")]
    Semaphore,

    #[error("Panic in blocking operation")]
    Canceled,

    #[error("Image processing took too long")]
    ProcessTimeout,

    #[error("No files present in upload")]
    NoFiles,

    #[error("Requested a photo that doesn't exist")]
    MissingPhoto,

    #[error("Requested a collection that doesn't exist")]
    MissingCollection,

    #[error("Requested a user that doesn't exist")]
    MissingUser,

    #[error("Missing or invalid user identity")]
    Unauthenticated,

    #[error("Application state is not configured")]
    MissingState,
}

impl UploadError {
    const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Upload(_) => ErrorCode::FILE_UPLOAD_ERROR,
            Self::Payload(_) => ErrorCode::READ_PAYLOAD_ERROR,
            Self::Repo(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Io(_) => ErrorCode::IO_ERROR,
            Self::Import(e) => e.error_code(),
            Self::Format(_) => ErrorCode::UNSUPPORTED_FORMAT,
            Self::Quota(e) => e.error_code(),
            Self::Batch(e) => e.error_code(),
            Self::Semaphore => ErrorCode::PROCESS_SEMAPHORE_CLOSED,
            Self::Canceled => ErrorCode::PANIC,
            Self::ProcessTimeout => ErrorCode::PROCESS_TIMEOUT,
            Self::NoFiles => ErrorCode::VALIDATE_NO_FILES,
            Self::MissingPhoto => ErrorCode::PHOTO_NOT_FOUND,
            Self::MissingCollection => ErrorCode::COLLECTION_NOT_FOUND,
            Self::MissingUser => ErrorCode::USER_NOT_FOUND,
            Self::Unauthenticated => ErrorCode::UNAUTHENTICATED,
            Self::MissingState => ErrorCode::MISSING_STATE,
        }
    }
}

impl From<actix_web::error::BlockingError> for UploadError {
    fn from(_: actix_web::error::BlockingError) -> Self {
        UploadError::Canceled
    }
}

impl From<tokio::task::JoinError> for UploadError {
    fn from(_: tokio::task::JoinError) -> Self {
        UploadError::Canceled
    }
}

impl From<tokio::sync::AcquireError> for UploadError {
    fn from(_: tokio::sync::AcquireError) -> Self {
        UploadError::Semaphore
    }
}

impl From<tokio::time::error::Elapsed> for UploadError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        UploadError::ProcessTimeout
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        use crate::upload::BatchError;

        match self.kind() {
            Some(UploadError::Format(_) | UploadError::Batch(BatchError::UnsupportedFormat)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Some(
                UploadError::Quota(
                    crate::quota::QuotaError::User { .. } | crate::quota::QuotaError::Global,
                )
                | UploadError::Batch(BatchError::UserQuota { .. } | BatchError::GlobalQuota),
            ) => StatusCode::PAYLOAD_TOO_LARGE,
            Some(
                UploadError::NoFiles
                | UploadError::Upload(_)
                | UploadError::Payload(_)
                | UploadError::Batch(BatchError::CorruptFile),
            ) => StatusCode::BAD_REQUEST,
            Some(UploadError::Import(e)) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Some(
                UploadError::MissingPhoto
                | UploadError::MissingCollection
                | UploadError::MissingUser,
            ) => StatusCode::NOT_FOUND,
            Some(UploadError::Store(e)) if e.is_not_found() => StatusCode::NOT_FOUND,
            Some(UploadError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let msg = if status.is_server_error() {
            String::from("Request failed")
        } else {
            self.root_cause().to_string()
        };

        HttpResponse::build(status)
            .content_type("application/json")
            .body(
                serde_json::to_string(&serde_json::json!({
                    "msg": msg,
                    "code": self.error_code()
                }))
                .unwrap_or_else(|_| {
                    r#"{"msg":"Request failed","code":"unknown-error"}"#.to_string()
                }),
            )
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, ResponseError};

    use crate::{formats::UnsupportedFormat, quota::QuotaError, upload::BatchError};

    use super::{Error, UploadError};

    #[test]
    fn status_codes() {
        let cases: [(Error, StatusCode); 6] = [
            (
                UnsupportedFormat(String::from("xyz")).into(),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                QuotaError::User { quota: 10 }.into(),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (BatchError::CorruptFile.into(), StatusCode::BAD_REQUEST),
            (BatchError::Storage.into(), StatusCode::INTERNAL_SERVER_ERROR),
            (UploadError::MissingPhoto.into(), StatusCode::NOT_FOUND),
            (UploadError::Unauthenticated.into(), StatusCode::UNAUTHORIZED),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error}");
        }
    }

    #[test]
    fn server_errors_hide_details() {
        let error: Error = std::io::Error::other("disk on fire").into();

        let response = error.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = actix_web::body::to_bytes(response.into_body());
        let body = futures_util::FutureExt::now_or_never(body)
            .expect("Body ready")
            .expect("Body read");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("Json body");

        assert_eq!(json["msg"], "Request failed");
        assert_eq!(json["code"], "io-error");
    }

    #[test]
    fn quota_message_names_user_limit() {
        let error: Error = BatchError::UserQuota { quota: 1_000_000 }.into();

        assert!(error.root_cause().to_string().contains("1000000"));
        assert_eq!(error.error_code().as_str(), "user-quota-exceeded");
    }
}
