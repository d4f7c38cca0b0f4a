use std::path::Path;

use actix_web::web::Bytes;
use uuid::Uuid;

/// Keeps a copy of an input that failed thumbnail generation under `dir`.
///
/// The write happens on a detached task. Failures are logged and otherwise ignored.
pub(crate) fn capture(
    dir: Option<&Path>,
    format: &str,
    bytes: Bytes,
) -> Option<tokio::task::JoinHandle<()>> {
    let dir = dir?;

    let extension = if format.is_empty() { "bin" } else { format };
    let path = dir.join(format!("{}.{extension}", Uuid::new_v4()));

    let span = tracing::info_span!(parent: None, "Capture diagnostics", path = ?path);
    span.follows_from(tracing::Span::current());

    let handle = crate::sync::spawn(
        "capture-diagnostics",
        tracing::Instrument::instrument(
            async move {
                match write(&path, &bytes).await {
                    Ok(()) => {
                        metrics::counter!(crate::init_metrics::DIAGNOSTICS_CAPTURED).increment(1);
                        tracing::info!("Saved failing input to {path:?}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to save failing input to {path:?}: {e}");
                    }
                }
            },
            span,
        ),
    );

    Some(handle)
}

async fn write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(path, bytes).await
}
