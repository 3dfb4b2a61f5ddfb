//! Multiregion Core
//!
//! Prepares the API Gateway, CloudFront and Route53 resources of a
//! multi-regional API deployment before they are merged into the service's
//! CloudFormation template.
//!
//! # Overview
//!
//! - **ServiceConfig**: the user's `custom.dns` / `custom.cdn` settings
//! - **ResolvedContext**: domain names and overrides derived once per run
//! - **Transformer**: the ordered rules that specialize the bundled resources
//! - **CertificateResolver**: finds a certificate ARN in a [`CertificateInventory`]
//! - **Preparer**: ties the steps together and merges the result
//!
//! # Example
//!
//! ```ignore
//! use multiregion_core::{InvocationOptions, Preparer, StaticInventory, Template};
//!
//! let preparer = Preparer::new(StaticInventory::empty());
//! let options = InvocationOptions::new("us-east-1", "prod", "orders");
//! let mut master = Template::from_json_str(&compiled_template)?;
//!
//! preparer
//!     .create_deployment_artifacts(&mut master, Template::base_resources()?, &config, &options)
//!     .await?;
//! ```

pub mod certificate;
pub mod config;
pub mod context;
pub mod error;
pub mod inventory;
pub mod loader;
pub mod merge;
pub mod preparer;
pub mod template;
pub mod transform;

pub use certificate::{CertificateResolver, best_match};
pub use config::{CdnSettings, DnsSettings, RegionSettings, ServiceConfig, ServiceDescription};
pub use context::{InvocationOptions, NamingConvention, ResolvedContext, SkipReason};
pub use error::{LoadError, LoadResult, TransformError, TransformResult};
pub use inventory::{
    CertificateInventory, CertificateStatus, CertificateSummary, InventoryError, StaticInventory,
};
pub use preparer::{Preparation, Preparer};
pub use template::Template;
pub use transform::{Certificates, DefaultsProfile, Transformer};
