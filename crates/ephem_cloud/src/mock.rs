//! In-memory cloud provisioner for testing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{CloudError, CloudResult};
use crate::provider::{s3_uri, CallerIdentity, CloudProvisioner, StateStorage, StorageStatus};

/// Mock cloud that keeps buckets, tables and objects in memory.
#[derive(Clone)]
pub struct MockCloud {
    account_id: String,
    credentials_error: Arc<RwLock<Option<String>>>,
    buckets: Arc<RwLock<BTreeSet<String>>>,
    tables: Arc<RwLock<BTreeSet<String>>>,
    /// `s3://bucket/key` → object size
    objects: Arc<RwLock<BTreeMap<String, usize>>>,
}

impl Default for MockCloud {
    fn default() -> Self {
        Self::new("123456789012")
    }
}

impl MockCloud {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            credentials_error: Arc::new(RwLock::new(None)),
            buckets: Arc::new(RwLock::new(BTreeSet::new())),
            tables: Arc::new(RwLock::new(BTreeSet::new())),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Pretend the state bucket and lock table were created earlier.
    pub fn with_storage(self, bucket: impl Into<String>, table: impl Into<String>) -> Self {
        self.buckets.write().insert(bucket.into());
        self.tables.write().insert(table.into());
        self
    }

    /// Put an object in place, e.g. an existing state file.
    pub fn with_object(self, bucket: &str, key: &str) -> Self {
        self.objects.write().insert(s3_uri(bucket, key), 0);
        self
    }

    /// Make every identity lookup fail.
    pub fn fail_credentials(self, message: impl Into<String>) -> Self {
        *self.credentials_error.write() = Some(message.into());
        self
    }

    pub fn buckets(&self) -> Vec<String> {
        self.buckets.read().iter().cloned().collect()
    }

    pub fn tables(&self) -> Vec<String> {
        self.tables.read().iter().cloned().collect()
    }

    /// URIs of every stored object.
    pub fn objects(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }
}

#[async_trait]
impl CloudProvisioner for MockCloud {
    async fn caller_identity(&self) -> CloudResult<CallerIdentity> {
        if let Some(message) = self.credentials_error.read().clone() {
            return Err(CloudError::Credentials(message));
        }
        Ok(CallerIdentity {
            account_id: self.account_id.clone(),
            arn: format!("arn:aws:iam::{}:user/mock", self.account_id),
            user_id: "MOCKUSER".to_string(),
        })
    }

    async fn ensure_state_storage(
        &self,
        storage: &StateStorage,
        bootstrap: bool,
    ) -> CloudResult<StorageStatus> {
        let mut status = StorageStatus::default();

        if !self.buckets.read().contains(&storage.bucket) {
            if !bootstrap {
                return Err(CloudError::StorageMissing(storage.bucket.clone()));
            }
            self.buckets.write().insert(storage.bucket.clone());
            status.bucket_created = true;
        }
        if !self.tables.read().contains(&storage.lock_table) {
            if !bootstrap {
                return Err(CloudError::LockTableMissing(storage.lock_table.clone()));
            }
            self.tables.write().insert(storage.lock_table.clone());
            status.lock_table_created = true;
        }

        Ok(status)
    }

    async fn stage_artifact(&self, bucket: &str, key: &str, path: &Path) -> CloudResult<String> {
        if !self.buckets.read().contains(bucket) {
            return Err(CloudError::StorageMissing(bucket.to_string()));
        }
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| CloudError::Artifact {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
            .len() as usize;

        let uri = s3_uri(bucket, key);
        self.objects.write().insert(uri.clone(), size);
        Ok(uri)
    }

    async fn state_exists(&self, bucket: &str, key: &str) -> CloudResult<bool> {
        Ok(self.objects.read().contains_key(&s3_uri(bucket, key)))
    }

    async fn remove_artifacts(&self, bucket: &str, prefix: &str) -> CloudResult<usize> {
        let prefix_uri = s3_uri(bucket, prefix);
        let mut objects = self.objects.write();
        let before = objects.len();
        objects.retain(|uri, _| !uri.starts_with(&prefix_uri));
        Ok(before - objects.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> StateStorage {
        StateStorage {
            bucket: "state".to_string(),
            lock_table: "locks".to_string(),
            region: "eu-west-1".to_string(),
            tags: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_storage_requires_bootstrap() {
        let cloud = MockCloud::default();
        let err = cloud.ensure_state_storage(&storage(), false).await.unwrap_err();
        assert!(matches!(err, CloudError::StorageMissing(_)));
        assert!(err.to_string().contains("--bootstrap"));

        let status = cloud.ensure_state_storage(&storage(), true).await.unwrap();
        assert!(status.bucket_created);
        assert!(status.lock_table_created);

        let again = cloud.ensure_state_storage(&storage(), false).await.unwrap();
        assert_eq!(again, StorageStatus::default());
    }

    #[tokio::test]
    async fn test_stage_and_remove_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fn.zip");
        std::fs::write(&file, b"zip").unwrap();

        let cloud = MockCloud::default().with_storage("state", "locks");
        let uri = cloud
            .stage_artifact("state", "artifacts/shop/dev/fn.zip", &file)
            .await
            .unwrap();
        assert_eq!(uri, "s3://state/artifacts/shop/dev/fn.zip");
        assert!(cloud.state_exists("state", "artifacts/shop/dev/fn.zip").await.unwrap());

        let removed = cloud.remove_artifacts("state", "artifacts/shop/dev/").await.unwrap();
        assert_eq!(removed, 1);
        assert!(cloud.objects().is_empty());
    }

    #[tokio::test]
    async fn test_credentials_failure() {
        let cloud = MockCloud::default().fail_credentials("expired token");
        let err = cloud.caller_identity().await.unwrap_err();
        assert!(err.to_string().contains("expired token"));
    }
}
