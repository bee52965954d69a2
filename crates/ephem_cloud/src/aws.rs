//! AWS implementation of the cloud provisioner.
//!
//! STS resolves the account, S3 holds Terraform state and staged artifacts,
//! DynamoDB provides the state lock table.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
    TableStatus,
};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration,
    PublicAccessBlockConfiguration, Tagging, VersioningConfiguration,
};
use tracing::{debug, info, warn};

use ephem_vars::AwsSettings;

use crate::error::{CloudError, CloudResult};
use crate::provider::{s3_uri, CallerIdentity, CloudProvisioner, StateStorage, StorageStatus};

/// Partition key Terraform's S3 backend expects in the lock table.
pub const LOCK_TABLE_KEY: &str = "LockID";

/// How long to wait for a new lock table to become active.
const TABLE_ACTIVE_TIMEOUT: Duration = Duration::from_secs(120);

/// Render an SDK error with its full source chain.
fn describe<E: std::error::Error>(err: &E) -> String {
    format!("{}", DisplayErrorContext(err))
}

/// AWS-backed provisioner.
#[derive(Debug, Clone)]
pub struct AwsCloud {
    sts: aws_sdk_sts::Client,
    s3: aws_sdk_s3::Client,
    dynamodb: aws_sdk_dynamodb::Client,
    region: String,
}

impl AwsCloud {
    /// Load the shared AWS configuration for the given region and profile.
    ///
    /// Credentials are resolved lazily, so problems surface on the first
    /// call (normally [`CloudProvisioner::caller_identity`]).
    pub async fn connect(settings: &AwsSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(profile) = &settings.profile {
            info!("Using AWS profile '{}'", profile);
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;
        Self::from_config(&config, &settings.region)
    }

    pub fn from_config(config: &SdkConfig, region: &str) -> Self {
        Self {
            sts: aws_sdk_sts::Client::new(config),
            s3: aws_sdk_s3::Client::new(config),
            dynamodb: aws_sdk_dynamodb::Client::new(config),
            region: region.to_string(),
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> CloudResult<bool> {
        match self.s3.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(CloudError::Storage(format!(
                        "cannot access bucket '{}': {}",
                        bucket,
                        describe(&err)
                    )))
                }
            }
        }
    }

    async fn create_bucket(&self, storage: &StateStorage) -> CloudResult<()> {
        info!("Creating state bucket {} in {}", storage.bucket, storage.region);

        let mut request = self.s3.create_bucket().bucket(&storage.bucket);
        // us-east-1 rejects an explicit location constraint
        if storage.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(storage.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| CloudError::Storage(format!("create bucket: {}", describe(&e))))?;

        self.s3
            .put_bucket_versioning()
            .bucket(&storage.bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| CloudError::Storage(format!("enable versioning: {}", describe(&e))))?;

        self.s3
            .put_public_access_block()
            .bucket(&storage.bucket)
            .public_access_block_configuration(
                PublicAccessBlockConfiguration::builder()
                    .block_public_acls(true)
                    .ignore_public_acls(true)
                    .block_public_policy(true)
                    .restrict_public_buckets(true)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| CloudError::Storage(format!("block public access: {}", describe(&e))))?;

        if !storage.tags.is_empty() {
            self.s3
                .put_bucket_tagging()
                .bucket(&storage.bucket)
                .tagging(s3_tagging(&storage.tags)?)
                .send()
                .await
                .map_err(|e| CloudError::Storage(format!("tag bucket: {}", describe(&e))))?;
        }

        Ok(())
    }

    async fn lock_table_exists(&self, table: &str) -> CloudResult<bool> {
        match self.dynamodb.describe_table().table_name(table).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_resource_not_found_exception())
                    .unwrap_or(false)
                {
                    Ok(false)
                } else {
                    Err(CloudError::Storage(format!(
                        "cannot access lock table '{}': {}",
                        table,
                        describe(&err)
                    )))
                }
            }
        }
    }

    async fn create_lock_table(&self, storage: &StateStorage) -> CloudResult<()> {
        info!("Creating lock table {}", storage.lock_table);

        let attribute = AttributeDefinition::builder()
            .attribute_name(LOCK_TABLE_KEY)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| CloudError::Storage(e.to_string()))?;
        let key = KeySchemaElement::builder()
            .attribute_name(LOCK_TABLE_KEY)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| CloudError::Storage(e.to_string()))?;

        let mut tags = Vec::with_capacity(storage.tags.len());
        for (k, v) in &storage.tags {
            tags.push(
                aws_sdk_dynamodb::types::Tag::builder()
                    .key(k)
                    .value(v)
                    .build()
                    .map_err(|e| CloudError::Storage(e.to_string()))?,
            );
        }

        self.dynamodb
            .create_table()
            .table_name(&storage.lock_table)
            .attribute_definitions(attribute)
            .key_schema(key)
            .billing_mode(BillingMode::PayPerRequest)
            .set_tags(if tags.is_empty() { None } else { Some(tags) })
            .send()
            .await
            .map_err(|e| CloudError::Storage(format!("create lock table: {}", describe(&e))))?;

        self.wait_for_table(&storage.lock_table).await
    }

    async fn wait_for_table(&self, table: &str) -> CloudResult<()> {
        let deadline = tokio::time::Instant::now() + TABLE_ACTIVE_TIMEOUT;

        loop {
            let out = self
                .dynamodb
                .describe_table()
                .table_name(table)
                .send()
                .await
                .map_err(|e| CloudError::Storage(format!("describe lock table: {}", describe(&e))))?;

            if out.table().and_then(|t| t.table_status()) == Some(&TableStatus::Active) {
                debug!("Lock table {} is active", table);
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CloudError::Storage(format!(
                    "lock table '{}' did not become active within {}s",
                    table,
                    TABLE_ACTIVE_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
    }
}

fn s3_tagging(tags: &BTreeMap<String, String>) -> CloudResult<Tagging> {
    let mut tag_set = Vec::with_capacity(tags.len());
    for (k, v) in tags {
        tag_set.push(
            aws_sdk_s3::types::Tag::builder()
                .key(k)
                .value(v)
                .build()
                .map_err(|e| CloudError::Storage(e.to_string()))?,
        );
    }
    Tagging::builder()
        .set_tag_set(Some(tag_set))
        .build()
        .map_err(|e| CloudError::Storage(e.to_string()))
}

#[async_trait]
impl CloudProvisioner for AwsCloud {
    async fn caller_identity(&self) -> CloudResult<CallerIdentity> {
        let out = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| CloudError::Credentials(describe(&e)))?;

        let account_id = out
            .account()
            .ok_or_else(|| CloudError::Credentials("STS returned no account id".to_string()))?
            .to_string();
        debug!("Resolved caller identity in account {}", account_id);

        Ok(CallerIdentity {
            account_id,
            arn: out.arn().unwrap_or_default().to_string(),
            user_id: out.user_id().unwrap_or_default().to_string(),
        })
    }

    async fn ensure_state_storage(
        &self,
        storage: &StateStorage,
        bootstrap: bool,
    ) -> CloudResult<StorageStatus> {
        if storage.region != self.region {
            warn!(
                "State storage region {} differs from client region {}",
                storage.region, self.region
            );
        }

        let mut status = StorageStatus::default();

        if !self.bucket_exists(&storage.bucket).await? {
            if !bootstrap {
                return Err(CloudError::StorageMissing(storage.bucket.clone()));
            }
            self.create_bucket(storage).await?;
            status.bucket_created = true;
        }

        if !self.lock_table_exists(&storage.lock_table).await? {
            if !bootstrap {
                return Err(CloudError::LockTableMissing(storage.lock_table.clone()));
            }
            self.create_lock_table(storage).await?;
            status.lock_table_created = true;
        }

        Ok(status)
    }

    async fn stage_artifact(&self, bucket: &str, key: &str, path: &Path) -> CloudResult<String> {
        let body = tokio::fs::read(path).await.map_err(|e| CloudError::Artifact {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!("Uploading {:?} ({} bytes) to s3://{}/{}", path, body.len(), bucket, key);

        self.s3
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| CloudError::Artifact {
                path: path.display().to_string(),
                message: describe(&e),
            })?;

        Ok(s3_uri(bucket, key))
    }

    async fn state_exists(&self, bucket: &str, key: &str) -> CloudResult<bool> {
        match self.s3.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(CloudError::Storage(format!(
                        "cannot read {}: {}",
                        s3_uri(bucket, key),
                        describe(&err)
                    )))
                }
            }
        }
    }

    async fn remove_artifacts(&self, bucket: &str, prefix: &str) -> CloudResult<usize> {
        let mut removed = 0;
        let mut pages = self
            .s3
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page =
                page.map_err(|e| CloudError::Storage(format!("list artifacts: {}", describe(&e))))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                self.s3
                    .delete_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| CloudError::Storage(format!("delete {}: {}", key, describe(&e))))?;
                removed += 1;
            }
        }

        info!("Removed {} staged artifact(s) under {}", removed, s3_uri(bucket, prefix));
        Ok(removed)
    }
}
