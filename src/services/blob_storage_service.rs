use anyhow::{bail, Context, Result};
use aws_sdk_s3::Client as S3Client;
use tracing::info;

/// Deletes uploaded library files from S3-compatible object storage.
/// Uploads happen client-side; this service only cleans up.
#[derive(Clone)]
pub struct BlobStorageService {
    client: S3Client,
    bucket_name: String,
}

impl std::fmt::Debug for BlobStorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStorageService")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

impl BlobStorageService {
    pub fn new(client: S3Client, bucket_name: String) -> Self {
        Self { client, bucket_name }
    }

    /// Build a client from the ambient AWS configuration (env, profile, IMDS)
    pub async fn from_env(bucket_name: String) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(S3Client::new(&sdk_config), bucket_name)
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub async fn delete_object(&self, storage_key: &str) -> Result<()> {
        let key = normalize_storage_key(storage_key)?;
        info!(bucket = %self.bucket_name, key, "Deleting stored file");

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .context("Failed to delete object from S3")?;

        Ok(())
    }
}

/// Keys are stored as given by the uploader; tolerate a leading slash
pub fn normalize_storage_key(storage_key: &str) -> Result<&str> {
    let key = storage_key.trim().trim_start_matches('/');
    if key.is_empty() {
        bail!("Storage key is empty");
    }
    if key.split('/').any(|segment| segment == "..") {
        bail!("Storage key {} escapes its prefix", storage_key);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_storage_key() {
        assert_eq!(normalize_storage_key("/library/abc/serve.mp4").unwrap(), "library/abc/serve.mp4");
        assert_eq!(normalize_storage_key("files/plan.pdf").unwrap(), "files/plan.pdf");
        assert!(normalize_storage_key("   ").is_err());
        assert!(normalize_storage_key("library/../secrets").is_err());
    }

    #[test]
    fn test_service_keeps_bucket() {
        let sdk_config = aws_config::SdkConfig::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .build();
        let service = BlobStorageService::new(S3Client::new(&sdk_config), "library-bucket".to_string());
        assert_eq!(service.bucket_name(), "library-bucket");
    }
}
