//! Access to uploaded telemetry objects.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::IngestError;

/// Retrieves the content of an uploaded object.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Reads the object `key` of `bucket` as text.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Object`] if the object cannot be read.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<String, IngestError>;
}

/// Serves objects from a local directory laid out as `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalDirectorySource {
    root: PathBuf,
}

impl LocalDirectorySource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn path_of(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectSource for LocalDirectorySource {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<String, IngestError> {
        let path = self.path_of(bucket, key);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| IngestError::Object {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: format!("{}: {e}", path.display()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_objects_below_bucket_directory() {
        let root = std::env::temp_dir().join("mobility_ingest_objects");
        let dir = root.join("uploads").join("cognito");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.csv"), "header\n").unwrap();

        let source = LocalDirectorySource::new(&root);
        assert_eq!(
            source.fetch("uploads", "cognito/a.csv").await.unwrap(),
            "header\n"
        );
        assert!(matches!(
            source.fetch("uploads", "cognito/missing.csv").await,
            Err(IngestError::Object { .. })
        ));
    }
}
