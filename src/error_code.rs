#[derive(Debug, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub(crate) struct ErrorCode {
    code: &'static str,
}

impl ErrorCode {
    pub(crate) const fn as_str(&self) -> &'static str {
        self.code
    }

    pub(crate) const UNSUPPORTED_FORMAT: ErrorCode = ErrorCode {
        code: "unsupported-format",
    };
    pub(crate) const CORRUPT_FILE: ErrorCode = ErrorCode {
        code: "corrupt-file",
    };
    pub(crate) const DECODE_IMAGE: ErrorCode = ErrorCode {
        code: "decode-image",
    };
    pub(crate) const DESCRIBE_IMAGE: ErrorCode = ErrorCode {
        code: "describe-image",
    };
    pub(crate) const GENERATE_THUMBNAIL: ErrorCode = ErrorCode {
        code: "generate-thumbnail",
    };
    pub(crate) const USER_QUOTA_EXCEEDED: ErrorCode = ErrorCode {
        code: "user-quota-exceeded",
    };
    pub(crate) const GLOBAL_QUOTA_EXCEEDED: ErrorCode = ErrorCode {
        code: "global-quota-exceeded",
    };
    pub(crate) const STORAGE_ERROR: ErrorCode = ErrorCode {
        code: "storage-error",
    };
    pub(crate) const FILE_IO_ERROR: ErrorCode = ErrorCode {
        code: "file-io-error",
    };
    pub(crate) const OBJECT_IO_ERROR: ErrorCode = ErrorCode {
        code: "object-io-error",
    };
    pub(crate) const FILE_EXISTS: ErrorCode = ErrorCode {
        code: "file-exists",
    };
    pub(crate) const OBJECT_STORE_CONFIG: ErrorCode = ErrorCode {
        code: "object-store-config",
    };
    pub(crate) const NOT_FOUND: ErrorCode = ErrorCode { code: "not-found" };
    pub(crate) const SLED_ERROR: ErrorCode = ErrorCode { code: "sled-error" };
    pub(crate) const EXTRACT_RECORD: ErrorCode = ErrorCode {
        code: "extract-record",
    };
    pub(crate) const CONFLICTED_RECORD: ErrorCode = ErrorCode {
        code: "conflicted-record",
    };
    pub(crate) const IO_ERROR: ErrorCode = ErrorCode { code: "io-error" };
    pub(crate) const PANIC: ErrorCode = ErrorCode { code: "panic" };
    pub(crate) const PROCESS_SEMAPHORE_CLOSED: ErrorCode = ErrorCode {
        code: "process-semaphore-closed",
    };
    pub(crate) const PROCESS_TIMEOUT: ErrorCode = ErrorCode {
        code: "process-timeout",
    };
    pub(crate) const FILE_UPLOAD_ERROR: ErrorCode = ErrorCode {
        code: "file-upload-error",
    };
    pub(crate) const READ_PAYLOAD_ERROR: ErrorCode = ErrorCode {
        code: "read-payload-error",
    };
    pub(crate) const VALIDATE_NO_FILES: ErrorCode = ErrorCode {
        code: "validate-no-files",
    };
    pub(crate) const PHOTO_NOT_FOUND: ErrorCode = ErrorCode {
        code: "photo-not-found",
    };
    pub(crate) const COLLECTION_NOT_FOUND: ErrorCode = ErrorCode {
        code: "collection-not-found",
    };
    pub(crate) const USER_NOT_FOUND: ErrorCode = ErrorCode {
        code: "user-not-found",
    };
    pub(crate) const UNAUTHENTICATED: ErrorCode = ErrorCode {
        code: "unauthenticated",
    };
    pub(crate) const INVALID_API_TOKEN: ErrorCode = ErrorCode {
        code: "invalid-api-token",
    };
    pub(crate) const MISSING_STATE: ErrorCode = ErrorCode {
        code: "missing-state",
    };
    pub(crate) const UNKNOWN_ERROR: ErrorCode = ErrorCode {
        code: "unknown-error",
    };
}
