pub(super) fn init_metrics() {
    describe_toplevel();
    describe_future();
    describe_ingest();
    describe_upload();
    describe_quota();
    describe_diagnostics();
    describe_object_storage();
}

fn describe_toplevel() {
    metrics::describe_counter!(FILES, "How many files have been uploaded to rawvault");
}

pub(crate) const FILES: &str = "rawvault.files";

fn describe_future() {
    metrics::describe_counter!(
        FUTURE_POLL_TIMER_EXCEEDED,
        "How many times a given poll operation has lasted longer than 10 microseconds"
    );
}

pub(crate) const FUTURE_POLL_TIMER_EXCEEDED: &str = "rawvault.future.poll-timer.exceeded";

fn describe_ingest() {
    metrics::describe_histogram!(
        INGEST_DESCRIBE,
        "Timings for extracting metadata from uploaded media"
    );
    metrics::describe_histogram!(
        INGEST_THUMBNAIL,
        "Timings for generating thumbnails of uploaded media"
    );
    metrics::describe_histogram!(
        INGEST_PERSIST,
        "Timings for writing binaries and descriptors of uploaded media"
    );
    metrics::describe_counter!(
        INGEST_END,
        "How many times media has been ingested, by outcome and format family"
    );
    metrics::describe_counter!(
        INGEST_ROLLBACK,
        "How many ingested files were rolled back because their batch failed"
    );
}

pub(crate) const INGEST_DESCRIBE: &str = "rawvault.ingest.describe";
pub(crate) const INGEST_THUMBNAIL: &str = "rawvault.ingest.thumbnail";
pub(crate) const INGEST_PERSIST: &str = "rawvault.ingest.persist";
pub(crate) const INGEST_END: &str = "rawvault.ingest.end";
pub(crate) const INGEST_ROLLBACK: &str = "rawvault.ingest.rollback";

fn describe_upload() {
    metrics::describe_histogram!(UPLOAD_DURATION, "Timings for complete upload batches");
    metrics::describe_counter!(
        UPLOAD_END,
        "How many upload batches have finished, and whether they completed or failed"
    );
}

pub(crate) const UPLOAD_DURATION: &str = "rawvault.upload.duration";
pub(crate) const UPLOAD_END: &str = "rawvault.upload.end";

fn describe_quota() {
    metrics::describe_counter!(
        QUOTA_REJECTED,
        "How many files were rejected for exceeding a storage quota, by scope"
    );
}

pub(crate) const QUOTA_REJECTED: &str = "rawvault.quota.rejected";

fn describe_diagnostics() {
    metrics::describe_counter!(
        DIAGNOSTICS_CAPTURED,
        "How many inputs that failed thumbnail generation were saved for inspection"
    );
}

pub(crate) const DIAGNOSTICS_CAPTURED: &str = "rawvault.diagnostics.captured";

fn describe_object_storage() {
    metrics::describe_histogram!(
        OBJECT_STORAGE_HEAD_BUCKET_REQUEST,
        "Timings for listing the rawvault buckets in object storage"
    );
    metrics::describe_histogram!(
        OBJECT_STORAGE_PUT_OBJECT_REQUEST,
        "Timings for PUT requests for uploading media to object storage"
    );
    metrics::describe_histogram!(
        OBJECT_STORAGE_GET_OBJECT_REQUEST,
        "Timings for requesting media from object storage"
    );
    metrics::describe_histogram!(
        OBJECT_STORAGE_DELETE_OBJECT_REQUEST,
        "Timings for requesting media in object storage be deleted"
    );
}

pub(crate) const OBJECT_STORAGE_HEAD_BUCKET_REQUEST: &str =
    "rawvault.object-storage.head-bucket-request";
pub(crate) const OBJECT_STORAGE_PUT_OBJECT_REQUEST: &str =
    "rawvault.object-storage.put-object-request";
pub(crate) const OBJECT_STORAGE_GET_OBJECT_REQUEST: &str =
    "rawvault.object-storage.get-object-request";
pub(crate) const OBJECT_STORAGE_DELETE_OBJECT_REQUEST: &str =
    "rawvault.object-storage.delete-object-request";
