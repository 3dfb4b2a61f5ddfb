//! Regional resources: API Gateway domain, base path mapping, Route53 record
//! and health check

use std::collections::BTreeSet;

use log::info;
use serde_json::{Map, Value};

use super::{child_mut, ids, patch_join_element, put, put_opt};
use crate::context::ResolvedContext;
use crate::error::TransformResult;
use crate::template::Template;

/// How a record names its hosted zone; the two fields are mutually exclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostedZone {
    Id(String),
    /// Zone name with the trailing dot (e.g., "example.com.")
    Name(String),
}

impl HostedZone {
    pub fn for_context(context: &ResolvedContext) -> Self {
        match context.hosted_zone_id.as_deref() {
            Some(id) if !id.is_empty() => HostedZone::Id(id.to_string()),
            _ => HostedZone::Name(format!("{}.", context.host_name)),
        }
    }

    pub(crate) fn render(&self, properties: &mut Map<String, Value>) {
        let (id, name) = match self {
            HostedZone::Id(id) => (Some(id.as_str()), None),
            HostedZone::Name(name) => (None, Some(name.as_str())),
        };
        put_opt(properties, "HostedZoneId", id);
        put_opt(properties, "HostedZoneName", name);
    }
}

/// Routing policy of the regional record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingPolicy {
    /// Latency-based routing to the given region
    Latency(String),
    /// Failover routing with the given role ("PRIMARY"/"SECONDARY")
    Failover(String),
}

impl RoutingPolicy {
    pub fn for_context(context: &ResolvedContext) -> Self {
        match context.region_settings.failover.as_deref() {
            Some(role) if !role.is_empty() => RoutingPolicy::Failover(role.to_string()),
            _ => RoutingPolicy::Latency(context.region.clone()),
        }
    }

    fn render(&self, properties: &mut Map<String, Value>) {
        let (region, failover) = match self {
            RoutingPolicy::Latency(region) => (Some(region.as_str()), None),
            RoutingPolicy::Failover(role) => (None, Some(role.as_str())),
        };
        put_opt(properties, "Region", region);
        put_opt(properties, "Failover", failover);
    }
}

/// Which health check the regional record uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthCheck {
    /// A health check managed outside this template
    External(String),
    /// The bundled health check, probing the given path
    Probe { resource_path: String },
}

impl HealthCheck {
    pub fn for_context(context: &ResolvedContext) -> Self {
        if let Some(id) = context.region_settings.health_check_id.as_deref()
            && !id.is_empty()
        {
            return HealthCheck::External(id.to_string());
        }

        let resource_path = context
            .health_check_resource_path
            .clone()
            .unwrap_or_else(|| format!("/{}/healthcheck", context.stage));
        HealthCheck::Probe { resource_path }
    }
}

/// Certificate configured for the active region, if any
pub fn explicit_certificate(context: &ResolvedContext) -> Option<&str> {
    context
        .region_settings
        .acm_certificate_arn
        .as_deref()
        .filter(|arn| !arn.is_empty())
}

/// Domain name and certificate of the regional API Gateway domain
pub fn prepare_domain_settings(
    template: &mut Template,
    context: &ResolvedContext,
    certificate: Option<&str>,
) -> TransformResult<()> {
    let properties = template.properties_mut(ids::REGIONAL_DOMAIN_NAME)?;
    put(properties, "DomainName", context.regional_domain_name.as_str());
    put_opt(properties, "RegionalCertificateArn", certificate);
    Ok(())
}

/// Stage of the base path mapping and of the stub deployment it waits on
pub fn prepare_base_path_mapping(
    template: &mut Template,
    context: &ResolvedContext,
) -> TransformResult<()> {
    let stub = template.properties_mut(ids::STUB_DEPLOYMENT)?;
    put(stub, "StageName", context.stage.as_str());

    let mapping = template.properties_mut(ids::REGIONAL_BASE_PATH_MAPPING)?;
    put(mapping, "Stage", context.stage.as_str());
    Ok(())
}

/// Hosted zone, routing policy and identifier of the regional record
pub fn prepare_endpoint_record(
    template: &mut Template,
    context: &ResolvedContext,
) -> TransformResult<()> {
    let properties = template.properties_mut(ids::REGIONAL_ENDPOINT_RECORD)?;
    HostedZone::for_context(context).render(properties);
    RoutingPolicy::for_context(context).render(properties);
    put(properties, "SetIdentifier", context.region.as_str());

    let elements = template.output_join_elements_mut(ids::REGIONAL_ENDPOINT_OUTPUT)?;
    patch_join_element(elements, 2, format!("/{}", context.stage));
    Ok(())
}

/// Bind the record to an external health check, or configure the bundled one
///
/// An external health check makes the bundled resource redundant, so it is
/// removed and recorded in `removed`.
pub fn prepare_health_check(
    template: &mut Template,
    context: &ResolvedContext,
    removed: &mut BTreeSet<String>,
) -> TransformResult<()> {
    match HealthCheck::for_context(context) {
        HealthCheck::External(id) => {
            let record = template.properties_mut(ids::REGIONAL_ENDPOINT_RECORD)?;
            put(record, "HealthCheckId", id.as_str());
            template.remove_resource(ids::REGIONAL_HEALTH_CHECK);
            removed.insert(ids::REGIONAL_HEALTH_CHECK.to_string());
            info!("Using health check {} for {}", id, context.region);
        }
        HealthCheck::Probe { resource_path } => {
            let properties = template.properties_mut(ids::REGIONAL_HEALTH_CHECK)?;
            let config = child_mut(
                properties,
                "HealthCheckConfig",
                "Resources.ApiRegionalHealthCheck.Properties.HealthCheckConfig",
            )?;
            put(config, "ResourcePath", resource_path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DnsSettings, RegionSettings, ServiceConfig};
    use crate::context::{InvocationOptions, NamingConvention};
    use serde_json::json;

    fn context_with(config: ServiceConfig) -> ResolvedContext {
        ResolvedContext::resolve(
            &config,
            &InvocationOptions::new("us-east-1", "staging", "orders"),
            NamingConvention::Stage,
        )
        .unwrap()
    }

    fn base_config() -> ServiceConfig {
        ServiceConfig {
            dns: DnsSettings {
                domain_name: Some("somedomain.example.com".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn with_region_settings(settings: RegionSettings) -> ServiceConfig {
        let mut config = base_config();
        config.dns.regions.insert("us-east-1".to_string(), settings);
        config
    }

    fn template_with(resources: Value) -> Template {
        Template::from_json_str(&json!({ "Resources": resources }).to_string()).unwrap()
    }

    #[test]
    fn domain_settings_from_explicit_settings() {
        let mut config = with_region_settings(RegionSettings {
            acm_certificate_arn: Some("test-certificate".to_string()),
            ..Default::default()
        });
        config.dns.regional_domain_name = Some("regional.domainname.com".to_string());
        let context = context_with(config);
        let mut template = template_with(json!({"ApiRegionalDomainName": {"Properties": {}}}));

        prepare_domain_settings(&mut template, &context, explicit_certificate(&context)).unwrap();

        let properties = &template.resources["ApiRegionalDomainName"]["Properties"];
        assert_eq!(properties["DomainName"], json!("regional.domainname.com"));
        assert_eq!(properties["RegionalCertificateArn"], json!("test-certificate"));
    }

    #[test]
    fn domain_settings_without_certificate_drops_field() {
        let context = context_with(base_config());
        let mut template = template_with(json!({
            "ApiRegionalDomainName": {"Properties": {"RegionalCertificateArn": "placeholder"}}
        }));

        prepare_domain_settings(&mut template, &context, None).unwrap();

        let properties = &template.resources["ApiRegionalDomainName"]["Properties"];
        assert!(properties.get("RegionalCertificateArn").is_none());
    }

    #[test]
    fn explicit_certificate_ignores_empty_arn() {
        let context = context_with(with_region_settings(RegionSettings {
            acm_certificate_arn: Some(String::new()),
            ..Default::default()
        }));
        assert_eq!(explicit_certificate(&context), None);
    }

    #[test]
    fn base_path_mapping_uses_stage() {
        let context = context_with(base_config());
        let mut template = template_with(json!({
            "ApiGatewayStubDeployment": {"Properties": {"StageName": "stub"}},
            "ApiRegionalBasePathMapping": {"Properties": {"Stage": "stage"}}
        }));

        prepare_base_path_mapping(&mut template, &context).unwrap();

        assert_eq!(
            template.resources["ApiGatewayStubDeployment"]["Properties"]["StageName"],
            json!("staging")
        );
        assert_eq!(
            template.resources["ApiRegionalBasePathMapping"]["Properties"]["Stage"],
            json!("staging")
        );
    }

    #[test]
    fn hosted_zone_prefers_explicit_id() {
        let mut config = base_config();
        config.dns.hosted_zone_id = Some("Z123".to_string());
        assert_eq!(
            HostedZone::for_context(&context_with(config)),
            HostedZone::Id("Z123".to_string())
        );
        assert_eq!(
            HostedZone::for_context(&context_with(base_config())),
            HostedZone::Name("example.com.".to_string())
        );
    }

    #[test]
    fn endpoint_record_with_failover() {
        let context = context_with(with_region_settings(RegionSettings {
            failover: Some("PRIMARY".to_string()),
            ..Default::default()
        }));
        let mut template = Template::base_resources().unwrap();

        prepare_endpoint_record(&mut template, &context).unwrap();

        let properties = &template.resources["ApiRegionalEndpointRecord"]["Properties"];
        assert_eq!(properties["Failover"], json!("PRIMARY"));
        assert!(properties.get("Region").is_none());
        assert_eq!(properties["SetIdentifier"], json!("us-east-1"));
        assert_eq!(properties["HostedZoneName"], json!("example.com."));
        assert!(properties.get("HostedZoneId").is_none());

        let elements = template.output_join_elements_mut("RegionalEndpoint").unwrap();
        assert_eq!(elements[2], json!("/staging"));
    }

    #[test]
    fn health_check_probe_path_defaults_to_stage() {
        let context = context_with(base_config());
        let mut template = Template::base_resources().unwrap();
        let mut removed = BTreeSet::new();

        prepare_health_check(&mut template, &context, &mut removed).unwrap();

        assert!(removed.is_empty());
        assert_eq!(
            template.resources["ApiRegionalHealthCheck"]["Properties"]["HealthCheckConfig"]
                ["ResourcePath"],
            json!("/staging/healthcheck")
        );
        assert_eq!(
            template.resources["ApiRegionalEndpointRecord"]["Properties"]["HealthCheckId"],
            json!({"Ref": "ApiRegionalHealthCheck"})
        );
    }

    #[test]
    fn health_check_probe_path_from_config() {
        let mut config = base_config();
        config.dns.health_check_resource_path = Some("/custom/health".to_string());
        assert_eq!(
            HealthCheck::for_context(&context_with(config)),
            HealthCheck::Probe {
                resource_path: "/custom/health".to_string()
            }
        );
    }

    #[test]
    fn health_check_probe_path_ignores_empty_config() {
        let mut config = base_config();
        config.dns.health_check_resource_path = Some(String::new());
        let context = context_with(config);
        let mut template = Template::base_resources().unwrap();

        prepare_health_check(&mut template, &context, &mut BTreeSet::new()).unwrap();

        assert_eq!(
            template.resources["ApiRegionalHealthCheck"]["Properties"]["HealthCheckConfig"]
                ["ResourcePath"],
            json!("/staging/healthcheck")
        );
    }

    #[test]
    fn external_health_check_removes_bundled_one() {
        let context = context_with(with_region_settings(RegionSettings {
            health_check_id: Some("hc-123".to_string()),
            ..Default::default()
        }));
        let mut template = Template::base_resources().unwrap();
        let mut removed = BTreeSet::new();

        prepare_health_check(&mut template, &context, &mut removed).unwrap();

        assert!(!template.contains_resource("ApiRegionalHealthCheck"));
        assert!(removed.contains("ApiRegionalHealthCheck"));
        assert_eq!(
            template.resources["ApiRegionalEndpointRecord"]["Properties"]["HealthCheckId"],
            json!("hc-123")
        );
    }
}
