use std::{
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use uuid::Uuid;

pub(crate) type ArcTmpDir = Arc<TmpDir>;

/// Scratch directory owned by this process, removed when dropped
#[derive(Debug)]
pub(crate) struct TmpDir {
    path: PathBuf,
}

impl TmpDir {
    pub(crate) async fn init<P: AsRef<Path>>(path: P) -> std::io::Result<Arc<Self>> {
        let path = path.as_ref().join(Uuid::now_v7().to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Arc::new(TmpDir { path }))
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn tmp_file(&self, ext: Option<&str>) -> TmpFile {
        let filename = if let Some(ext) = ext {
            format!("{}{}", Uuid::now_v7(), ext)
        } else {
            Uuid::now_v7().to_string()
        };

        TmpFile(Some(self.path.join(filename)))
    }
}

impl Drop for TmpDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove temporary directory {:?}: {e}", self.path);
            }
        }
    }
}

/// Path to a file that is removed on every exit path once this guard drops
#[must_use]
pub(crate) struct TmpFile(Option<PathBuf>);

impl TmpFile {
    pub(crate) fn cleanup(mut self) -> std::io::Result<()> {
        if let Some(path) = self.0.take() {
            remove_file(&path)?;
        }

        Ok(())
    }
}

fn remove_file(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

impl AsRef<Path> for TmpFile {
    fn as_ref(&self) -> &Path {
        self
    }
}

impl Deref for TmpFile {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.0.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = remove_file(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TmpDir;

    #[tokio::test]
    async fn tmp_file_is_removed_on_drop() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let tmp_dir = TmpDir::init(root.path()).await.expect("Created tmp dir");

        let tmp_file = tmp_dir.tmp_file(Some(".nef"));
        std::fs::write(&tmp_file, b"bytes").expect("Wrote file");
        let path = tmp_file.to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("nef"));

        drop(tmp_file);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn cleanup_tolerates_missing_files() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let tmp_dir = TmpDir::init(root.path()).await.expect("Created tmp dir");

        tmp_dir
            .tmp_file(None)
            .cleanup()
            .expect("Missing file is not an error");
    }

    #[tokio::test]
    async fn tmp_dir_is_removed_on_drop() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let tmp_dir = TmpDir::init(root.path()).await.expect("Created tmp dir");
        let path = tmp_dir.path().to_path_buf();

        assert!(path.is_dir());
        drop(tmp_dir);
        assert!(!path.exists());
    }
}
