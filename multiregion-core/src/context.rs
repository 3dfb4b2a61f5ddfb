//! Context - Values derived once per invocation from the configuration
//!
//! The resolved context is computed before any template edit or certificate
//! lookup and is shared read-only by every rule afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{CdnSettings, LoggingSettings, RegionSettings, ServiceConfig};

/// Region and stage the deployment is running for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOptions {
    pub region: String,
    pub stage: String,
    /// Service name (e.g., "orders"), used for API and stack names
    pub service: String,
}

impl InvocationOptions {
    pub fn new(
        region: impl Into<String>,
        stage: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            stage: stage.into(),
            service: service.into(),
        }
    }

    /// API Gateway name as the deployment tool names it
    pub fn api_name(&self) -> String {
        format!("{}-{}", self.service, self.stage)
    }

    /// CloudFormation stack name as the deployment tool names it
    pub fn stack_name(&self) -> String {
        format!("{}-{}", self.service, self.stage)
    }
}

/// How a regional domain name is synthesized when none is configured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingConvention {
    /// `api.example.com` -> `api-prod.example.com`
    #[default]
    Stage,
    /// `api.example.com` -> `api-us-east-1.example.com`
    Region,
}

impl NamingConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamingConvention::Stage => "stage",
            NamingConvention::Region => "region",
        }
    }

    fn suffix<'a>(&self, options: &'a InvocationOptions) -> &'a str {
        match self {
            NamingConvention::Stage => &options.stage,
            NamingConvention::Region => &options.region,
        }
    }
}

impl fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NamingConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stage" => Ok(NamingConvention::Stage),
            "region" => Ok(NamingConvention::Region),
            other => Err(format!(
                "unknown naming convention '{}', expected 'stage' or 'region'",
                other
            )),
        }
    }
}

/// Why the transformation was skipped. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// `custom.cdn.disabled` is true
    Disabled,
    /// `custom.dns.domainName` is absent or empty
    MissingDomainName,
    /// The domain name has fewer than 3 labels
    InvalidDomainConfiguration(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "The multi-regional resources are disabled"),
            SkipReason::MissingDomainName => write!(f, "The domainName parameter is required"),
            SkipReason::InvalidDomainConfiguration(domain) => {
                write!(f, "The domainName was not valid: {}.", domain)
            }
        }
    }
}

/// Everything the rules need, resolved once
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContext {
    /// e.g., "api.example.com"
    pub full_domain_name: String,
    /// Last two labels, e.g., "example.com"
    pub host_name: String,
    /// e.g., "api-prod.example.com"
    pub regional_domain_name: String,
    pub region: String,
    pub stage: String,
    pub api_name: String,
    pub stack_name: String,
    pub hosted_zone_id: Option<String>,
    pub health_check_resource_path: Option<String>,
    /// Overrides for the active region (empty when none were configured)
    pub region_settings: RegionSettings,
    pub cdn: CdnSettings,
}

impl ResolvedContext {
    /// Resolve the context, or explain why the transformation should be skipped
    pub fn resolve(
        config: &ServiceConfig,
        options: &InvocationOptions,
        convention: NamingConvention,
    ) -> Result<Self, SkipReason> {
        if config.cdn.is_disabled() {
            return Err(SkipReason::Disabled);
        }

        let full_domain_name = match config.dns.domain_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(SkipReason::MissingDomainName),
        };

        let segments: Vec<&str> = full_domain_name.split('.').collect();
        if segments.len() < 3 {
            return Err(SkipReason::InvalidDomainConfiguration(full_domain_name));
        }

        let host_name = segments[segments.len() - 2..].join(".");
        let regional_domain_name = build_regional_domain_name(
            &segments,
            config.dns.regional_domain_name.as_deref(),
            convention,
            options,
        );

        Ok(Self {
            host_name,
            regional_domain_name,
            region: options.region.clone(),
            stage: options.stage.clone(),
            api_name: options.api_name(),
            stack_name: options.stack_name(),
            hosted_zone_id: non_empty(config.dns.hosted_zone_id.as_deref()),
            health_check_resource_path: non_empty(
                config.dns.health_check_resource_path.as_deref(),
            ),
            region_settings: config
                .dns
                .region(&options.region)
                .map(normalize_region_settings)
                .unwrap_or_default(),
            cdn: normalize_cdn(&config.cdn),
            full_domain_name,
        })
    }
}

/// Empty strings in the configuration count as not configured
fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|value| !value.is_empty()).map(str::to_string)
}

fn normalize_region_settings(settings: &RegionSettings) -> RegionSettings {
    RegionSettings {
        acm_certificate_arn: non_empty(settings.acm_certificate_arn.as_deref()),
        health_check_id: non_empty(settings.health_check_id.as_deref()),
        failover: non_empty(settings.failover.as_deref()),
    }
}

fn normalize_cdn(cdn: &CdnSettings) -> CdnSettings {
    CdnSettings {
        region: non_empty(cdn.region.as_deref()),
        price_class: non_empty(cdn.price_class.as_deref()),
        logging: cdn.logging.as_ref().map(|logging| LoggingSettings {
            bucket_name: logging.bucket_name.clone(),
            prefix: non_empty(logging.prefix.as_deref()),
        }),
        web_acl_id: non_empty(cdn.web_acl_id.as_deref()),
        acm_certificate_arn: non_empty(cdn.acm_certificate_arn.as_deref()),
        origin_path: non_empty(cdn.origin_path.as_deref()),
        ..cdn.clone()
    }
}

/// Build the regional endpoint hostname
///
/// An explicit (non-empty) override is returned unchanged. Otherwise the
/// label third from the end gets a `-{stage}` or `-{region}` suffix,
/// depending on the convention. `segments` must hold at least 3 labels.
pub fn build_regional_domain_name(
    segments: &[&str],
    explicit: Option<&str>,
    convention: NamingConvention,
    options: &InvocationOptions,
) -> String {
    if let Some(name) = explicit
        && !name.is_empty()
    {
        return name.to_string();
    }

    let index = segments.len() - 3;
    segments
        .iter()
        .enumerate()
        .map(|(i, label)| {
            if i == index {
                format!("{}-{}", label, convention.suffix(options))
            } else {
                label.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
