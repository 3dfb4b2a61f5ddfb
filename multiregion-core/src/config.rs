//! Config - User-supplied settings read from the service description
//!
//! Mirrors the `custom.dns` / `custom.cdn` sections of a serverless service
//! file. Every key is optional; validation of the domain name happens in
//! [`crate::context`], not here.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Settings for the whole plugin (`custom` section)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub dns: DnsSettings,
    #[serde(default)]
    pub cdn: CdnSettings,
}

/// A full service description: the service name plus its `custom` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescription {
    /// Service name, used to derive the API and stack names
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub custom: ServiceConfig,
}

/// DNS settings (`custom.dns`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsSettings {
    /// Customer-facing domain name (e.g., "api.example.com")
    pub domain_name: Option<String>,
    /// Explicit regional endpoint hostname; synthesized when absent
    pub regional_domain_name: Option<String>,
    pub hosted_zone_id: Option<String>,
    pub health_check_resource_path: Option<String>,
    /// Per-region overrides, keyed by region name (e.g., "us-east-1")
    ///
    /// Only mappings are read as overrides; other unknown keys are ignored.
    #[serde(flatten, deserialize_with = "deserialize_regions")]
    pub regions: BTreeMap<String, RegionSettings>,
}

fn deserialize_regions<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, RegionSettings>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = BTreeMap::<String, Value>::deserialize(deserializer)?;
    entries
        .into_iter()
        .filter(|(_, value)| value.is_object())
        .map(|(region, value)| {
            serde_json::from_value(value)
                .map(|settings| (region.clone(), settings))
                .map_err(|e| serde::de::Error::custom(format!("dns.{}: {}", region, e)))
        })
        .collect()
}

impl DnsSettings {
    /// Overrides for a region, if any were configured
    pub fn region(&self, region: &str) -> Option<&RegionSettings> {
        self.regions.get(region)
    }
}

/// Per-region overrides (`custom.dns.<region>`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSettings {
    pub acm_certificate_arn: Option<String>,
    pub health_check_id: Option<String>,
    /// Route53 failover role ("PRIMARY" or "SECONDARY")
    pub failover: Option<String>,
}

/// CloudFront settings (`custom.cdn`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdnSettings {
    /// Disables the whole transformation when true
    pub disabled: Option<bool>,
    /// The single region that owns the distribution
    pub region: Option<String>,
    /// Stages allowed to create the distribution; all stages when absent
    pub enabled: Option<Vec<String>>,
    pub price_class: Option<String>,
    pub headers: Option<Vec<String>>,
    pub aliases: Option<Vec<String>>,
    pub logging: Option<LoggingSettings>,
    #[serde(rename = "webACLId")]
    pub web_acl_id: Option<String>,
    pub acm_certificate_arn: Option<String>,
    pub origin_path: Option<String>,
}

impl CdnSettings {
    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }
}

/// Access logging for the distribution (`custom.cdn.logging`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSettings {
    pub bucket_name: String,
    pub prefix: Option<String>,
}
