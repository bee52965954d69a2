//! Cloud provisioner trait and types.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CloudResult;

/// Identity the current credentials resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account_id: String,
    pub arn: String,
    pub user_id: String,
}

/// Remote state storage for Terraform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStorage {
    pub bucket: String,
    pub lock_table: String,
    pub region: String,
    /// Tags applied to storage created during bootstrap
    pub tags: BTreeMap<String, String>,
}

impl StateStorage {
    /// Default bucket name: one state bucket per account and region.
    pub fn default_bucket_name(account_id: &str, region: &str) -> String {
        format!("ephem-state-{}-{}", account_id, region)
    }
}

/// What `ensure_state_storage` had to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStatus {
    pub bucket_created: bool,
    pub lock_table_created: bool,
}

/// Build an `s3://` URI.
pub fn s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key.trim_start_matches('/'))
}

/// Cloud operations the pipeline needs.
#[async_trait]
pub trait CloudProvisioner: Send + Sync {
    /// Resolve the account behind the configured credentials.
    async fn caller_identity(&self) -> CloudResult<CallerIdentity>;

    /// Make sure the state bucket and lock table exist, creating them when
    /// `bootstrap` is set.
    async fn ensure_state_storage(
        &self,
        storage: &StateStorage,
        bootstrap: bool,
    ) -> CloudResult<StorageStatus>;

    /// Upload a local file and return its `s3://` URI.
    async fn stage_artifact(&self, bucket: &str, key: &str, path: &Path) -> CloudResult<String>;

    /// Whether a state object exists.
    async fn state_exists(&self, bucket: &str, key: &str) -> CloudResult<bool>;

    /// Delete every object under a prefix, returning the number removed.
    async fn remove_artifacts(&self, bucket: &str, prefix: &str) -> CloudResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bucket_name() {
        assert_eq!(
            StateStorage::default_bucket_name("123456789012", "eu-west-1"),
            "ephem-state-123456789012-eu-west-1"
        );
    }

    #[test]
    fn test_s3_uri() {
        assert_eq!(s3_uri("b", "/a/b.zip"), "s3://b/a/b.zip");
        assert_eq!(s3_uri("b", "a/b.zip"), "s3://b/a/b.zip");
    }
}
