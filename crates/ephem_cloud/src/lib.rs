//! # ephem_cloud
//!
//! Cloud-side plumbing for ephem environments: account identity, remote
//! state storage (bucket + lock table), and artifact staging.
//!
//! The pipeline only talks to the [`CloudProvisioner`] trait; [`AwsCloud`]
//! is the production implementation and [`MockCloud`] keeps everything in
//! memory for tests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ephem_cloud::{AwsCloud, CloudProvisioner, StateStorage};
//! use ephem_vars::AwsSettings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = AwsSettings {
//!         region: "eu-west-1".to_string(),
//!         profile: Some("sandbox".to_string()),
//!         account_id: None,
//!     };
//!     let cloud = AwsCloud::connect(&settings).await;
//!     let identity = cloud.caller_identity().await?;
//!
//!     let storage = StateStorage {
//!         bucket: StateStorage::default_bucket_name(&identity.account_id, &settings.region),
//!         lock_table: "ephem-locks".to_string(),
//!         region: settings.region.clone(),
//!         tags: Default::default(),
//!     };
//!     cloud.ensure_state_storage(&storage, true).await?;
//!     Ok(())
//! }
//! ```

pub mod aws;
pub mod error;
pub mod mock;
pub mod provider;

pub use aws::AwsCloud;
pub use error::{CloudError, CloudResult};
pub use mock::MockCloud;
pub use provider::{s3_uri, CallerIdentity, CloudProvisioner, StateStorage, StorageStatus};
