//! CloudFront distribution and the global Route53 record in front of it

use std::collections::BTreeSet;

use log::info;
use serde_json::Value;

use super::regional::HostedZone;
use super::{DefaultsProfile, child_mut, ids, patch_join_element, put, put_opt};
use crate::context::ResolvedContext;
use crate::error::{TransformError, TransformResult};
use crate::template::Template;

/// Where CloudFront writes its access logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingTarget {
    /// S3 bucket hostname (e.g., "my-logs.s3.amazonaws.com")
    pub bucket: String,
    pub prefix: String,
}

/// Whether this region and stage own the distribution
///
/// True only when the configured CDN region is the active region, the stage
/// is allowed (or no allow-list is configured) and the CDN is not disabled.
pub fn should_create_distribution(context: &ResolvedContext) -> bool {
    let cdn = &context.cdn;
    let in_region = cdn.region.as_deref() == Some(context.region.as_str());
    let stage_enabled = cdn
        .enabled
        .as_ref()
        .is_none_or(|stages| stages.iter().any(|stage| stage == &context.stage));
    in_region && stage_enabled && !cdn.is_disabled()
}

/// Remove the distribution, the global record and the outputs naming them
pub fn prune_distribution(template: &mut Template, removed: &mut BTreeSet<String>) {
    for id in [ids::DISTRIBUTION, ids::GLOBAL_ENDPOINT_RECORD] {
        template.remove_resource(id);
        removed.insert(id.to_string());
    }
    template.remove_output(ids::DISTRIBUTION_OUTPUT);
    template.remove_output(ids::GLOBAL_ENDPOINT_OUTPUT);
    info!("Skipping the CloudFront distribution for this region and stage");
}

/// Certificate configured for the distribution, if any
///
/// The CDN setting wins; otherwise the active region's certificate is used,
/// since the distribution is only created in its own region.
pub fn explicit_certificate(context: &ResolvedContext) -> Option<&str> {
    context
        .cdn
        .acm_certificate_arn
        .as_deref()
        .filter(|arn| !arn.is_empty())
        .or_else(|| super::regional::explicit_certificate(context))
}

pub fn headers(context: &ResolvedContext, defaults: &DefaultsProfile) -> Vec<String> {
    context
        .cdn
        .headers
        .clone()
        .unwrap_or_else(|| defaults.headers.clone())
}

pub fn price_class(context: &ResolvedContext, defaults: &DefaultsProfile) -> String {
    context
        .cdn
        .price_class
        .clone()
        .unwrap_or_else(|| defaults.price_class.clone())
}

/// Distribution aliases; `None` when an empty list was configured
pub fn aliases(context: &ResolvedContext) -> Option<Vec<String>> {
    match &context.cdn.aliases {
        Some(aliases) if aliases.is_empty() => None,
        Some(aliases) => Some(aliases.clone()),
        None => Some(vec![context.full_domain_name.clone()]),
    }
}

pub fn logging_target(context: &ResolvedContext) -> Option<LoggingTarget> {
    context.cdn.logging.as_ref().map(|logging| LoggingTarget {
        bucket: format!("{}.s3.amazonaws.com", logging.bucket_name),
        prefix: logging.prefix.clone().unwrap_or_else(|| {
            format!("aws-cloudfront/api/{}/{}", context.stage, context.stack_name)
        }),
    })
}

/// Fill in the distribution config
///
/// Without a certificate the `ViewerCertificate` block is removed and
/// CloudFront falls back to its default certificate.
pub fn prepare_distribution(
    template: &mut Template,
    context: &ResolvedContext,
    defaults: &DefaultsProfile,
    certificate: Option<&str>,
) -> TransformResult<()> {
    const PATH: &str = "Resources.ApiDistribution.Properties.DistributionConfig";

    let properties = template.properties_mut(ids::DISTRIBUTION)?;
    let config = child_mut(properties, "DistributionConfig", PATH)?;

    put(config, "Comment", format!("API: {}", context.api_name));

    let origin = config
        .get_mut("Origins")
        .and_then(|origins| origins.get_mut(0))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            TransformError::unexpected_shape(format!("{}.Origins[0]", PATH), "a mapping")
        })?;
    put(origin, "DomainName", context.regional_domain_name.as_str());
    if let Some(origin_path) = context.cdn.origin_path.as_deref() {
        put(origin, "OriginPath", origin_path);
    }

    let behavior = child_mut(
        config,
        "DefaultCacheBehavior",
        &format!("{}.DefaultCacheBehavior", PATH),
    )?;
    let forwarded = child_mut(
        behavior,
        "ForwardedValues",
        &format!("{}.DefaultCacheBehavior.ForwardedValues", PATH),
    )?;
    put(forwarded, "Headers", headers(context, defaults));

    put(config, "PriceClass", price_class(context, defaults));
    put_opt(config, "Aliases", aliases(context));

    match logging_target(context) {
        Some(target) => {
            let logging = child_mut(config, "Logging", &format!("{}.Logging", PATH))?;
            put(logging, "Bucket", target.bucket);
            put(logging, "Prefix", target.prefix);
        }
        None => {
            config.remove("Logging");
        }
    }

    put_opt(config, "WebACLId", context.cdn.web_acl_id.as_deref());

    match certificate {
        Some(arn) => {
            let viewer = child_mut(
                config,
                "ViewerCertificate",
                &format!("{}.ViewerCertificate", PATH),
            )?;
            put(viewer, "AcmCertificateArn", arn);
        }
        None => {
            config.remove("ViewerCertificate");
        }
    }

    Ok(())
}

/// Hosted zone and name of the global record, plus the global endpoint output
pub fn prepare_global_endpoint_record(
    template: &mut Template,
    context: &ResolvedContext,
) -> TransformResult<()> {
    let properties = template.properties_mut(ids::GLOBAL_ENDPOINT_RECORD)?;
    HostedZone::for_context(context).render(properties);
    put(properties, "Name", format!("{}.", context.full_domain_name));

    let elements = template.output_join_elements_mut(ids::GLOBAL_ENDPOINT_OUTPUT)?;
    patch_join_element(elements, 1, context.full_domain_name.as_str());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CdnSettings, DnsSettings, LoggingSettings, RegionSettings, ServiceConfig,
    };
    use crate::context::{InvocationOptions, NamingConvention};
    use serde_json::json;

    fn context_with(cdn: CdnSettings, stage: &str) -> ResolvedContext {
        let config = ServiceConfig {
            dns: DnsSettings {
                domain_name: Some("api.example.com".to_string()),
                ..Default::default()
            },
            cdn,
        };
        ResolvedContext::resolve(
            &config,
            &InvocationOptions::new("us-east-1", stage, "orders"),
            NamingConvention::Stage,
        )
        .unwrap()
    }

    fn cdn_in(region: &str) -> CdnSettings {
        CdnSettings {
            region: Some(region.to_string()),
            ..Default::default()
        }
    }

    fn distribution_config(template: &Template) -> &Value {
        &template.resources["ApiDistribution"]["Properties"]["DistributionConfig"]
    }

    #[test]
    fn distribution_requires_matching_region() {
        assert!(should_create_distribution(&context_with(cdn_in("us-east-1"), "prod")));
        assert!(!should_create_distribution(&context_with(cdn_in("eu-west-1"), "prod")));
        assert!(!should_create_distribution(&context_with(CdnSettings::default(), "prod")));
    }

    #[test]
    fn distribution_respects_enabled_stages() {
        let mut cdn = cdn_in("us-east-1");
        cdn.enabled = Some(vec!["prod".to_string()]);
        assert!(should_create_distribution(&context_with(cdn.clone(), "prod")));
        assert!(!should_create_distribution(&context_with(cdn, "dev")));
    }

    #[test]
    fn prune_removes_resources_and_outputs() {
        let mut template = Template::base_resources().unwrap();
        let mut removed = BTreeSet::new();

        prune_distribution(&mut template, &mut removed);

        assert!(!template.contains_resource("ApiDistribution"));
        assert!(!template.contains_resource("ApiGlobalEndpointRecord"));
        assert!(!template.contains_output("ApiDistribution"));
        assert!(!template.contains_output("GlobalEndpoint"));
        assert!(template.references_to(&removed).is_empty());
    }

    #[test]
    fn aliases_default_to_full_domain() {
        assert_eq!(
            aliases(&context_with(cdn_in("us-east-1"), "prod")),
            Some(vec!["api.example.com".to_string()])
        );

        let mut cdn = cdn_in("us-east-1");
        cdn.aliases = Some(vec![]);
        assert_eq!(aliases(&context_with(cdn, "prod")), None);
    }

    #[test]
    fn logging_prefix_defaults_to_stage_and_stack() {
        let mut cdn = cdn_in("us-east-1");
        cdn.logging = Some(LoggingSettings {
            bucket_name: "my-logs".to_string(),
            prefix: None,
        });
        assert_eq!(
            logging_target(&context_with(cdn, "prod")),
            Some(LoggingTarget {
                bucket: "my-logs.s3.amazonaws.com".to_string(),
                prefix: "aws-cloudfront/api/prod/orders-prod".to_string(),
            })
        );
    }

    #[test]
    fn cdn_certificate_falls_back_to_region_certificate() {
        let config = ServiceConfig {
            dns: DnsSettings {
                domain_name: Some("api.example.com".to_string()),
                regions: [(
                    "us-east-1".to_string(),
                    RegionSettings {
                        acm_certificate_arn: Some("arn:region".to_string()),
                        ..Default::default()
                    },
                )]
                .into_iter()
                .collect(),
                ..Default::default()
            },
            cdn: cdn_in("us-east-1"),
        };
        let options = InvocationOptions::new("us-east-1", "prod", "orders");
        let mut context =
            ResolvedContext::resolve(&config, &options, NamingConvention::Stage).unwrap();
        assert_eq!(explicit_certificate(&context), Some("arn:region"));

        context.cdn.acm_certificate_arn = Some("arn:cdn".to_string());
        assert_eq!(explicit_certificate(&context), Some("arn:cdn"));
    }

    #[test]
    fn prepare_distribution_with_defaults() {
        let context = context_with(cdn_in("us-east-1"), "prod");
        let mut template = Template::base_resources().unwrap();

        prepare_distribution(&mut template, &context, &DefaultsProfile::default(), None).unwrap();

        let config = distribution_config(&template);
        assert_eq!(config["Comment"], json!("API: orders-prod"));
        assert_eq!(config["Origins"][0]["DomainName"], json!("api-prod.example.com"));
        assert!(config["Origins"][0].get("OriginPath").is_none());
        assert_eq!(
            config["DefaultCacheBehavior"]["ForwardedValues"]["Headers"],
            json!(["Accept", "Authorization"])
        );
        assert_eq!(config["PriceClass"], json!("PriceClass_100"));
        assert_eq!(config["Aliases"], json!(["api.example.com"]));
        assert!(config.get("Logging").is_none());
        assert!(config.get("WebACLId").is_none());
        assert!(config.get("ViewerCertificate").is_none());
        // untouched fields survive
        assert_eq!(config["HttpVersion"], json!("http2"));
    }

    #[test]
    fn prepare_distribution_treats_empty_settings_as_absent() {
        let cdn: CdnSettings = serde_yaml::from_str(
            r#"
region: us-east-1
priceClass: ''
webACLId: ''
logging:
  bucketName: my-logs
  prefix: ''
"#,
        )
        .unwrap();
        let context = context_with(cdn, "prod");
        let mut template = Template::base_resources().unwrap();

        prepare_distribution(&mut template, &context, &DefaultsProfile::default(), None).unwrap();

        let config = distribution_config(&template);
        assert_eq!(config["PriceClass"], json!("PriceClass_100"));
        assert!(config.get("WebACLId").is_none());
        assert_eq!(
            config["Logging"]["Prefix"],
            json!("aws-cloudfront/api/prod/orders-prod")
        );
    }

    #[test]
    fn prepare_distribution_with_settings() {
        let cdn = CdnSettings {
            region: Some("us-east-1".to_string()),
            price_class: Some("PriceClass_All".to_string()),
            headers: Some(vec!["Accept-Language".to_string()]),
            aliases: Some(vec![]),
            logging: Some(LoggingSettings {
                bucket_name: "my-logs".to_string(),
                prefix: Some("custom".to_string()),
            }),
            web_acl_id: Some("waf-1".to_string()),
            origin_path: Some("/v1".to_string()),
            ..Default::default()
        };
        let context = context_with(cdn, "prod");
        let mut template = Template::base_resources().unwrap();
        let defaults = DefaultsProfile::default().with_price_class("PriceClass_200");

        prepare_distribution(&mut template, &context, &defaults, Some("arn:cdn")).unwrap();

        let config = distribution_config(&template);
        assert_eq!(config["PriceClass"], json!("PriceClass_All"));
        assert_eq!(
            config["DefaultCacheBehavior"]["ForwardedValues"]["Headers"],
            json!(["Accept-Language"])
        );
        assert!(config.get("Aliases").is_none());
        assert_eq!(config["Logging"]["Bucket"], json!("my-logs.s3.amazonaws.com"));
        assert_eq!(config["Logging"]["Prefix"], json!("custom"));
        assert_eq!(config["Logging"]["IncludeCookies"], json!(false));
        assert_eq!(config["WebACLId"], json!("waf-1"));
        assert_eq!(config["Origins"][0]["OriginPath"], json!("/v1"));
        assert_eq!(config["ViewerCertificate"]["AcmCertificateArn"], json!("arn:cdn"));
        assert_eq!(config["ViewerCertificate"]["SslSupportMethod"], json!("sni-only"));
    }

    #[test]
    fn prepare_distribution_uses_profile_defaults() {
        let context = context_with(cdn_in("us-east-1"), "prod");
        let mut template = Template::base_resources().unwrap();
        let defaults = DefaultsProfile::default()
            .with_price_class("PriceClass_All")
            .with_headers(vec!["Host".to_string()]);

        prepare_distribution(&mut template, &context, &defaults, None).unwrap();

        let config = distribution_config(&template);
        assert_eq!(config["PriceClass"], json!("PriceClass_All"));
        assert_eq!(
            config["DefaultCacheBehavior"]["ForwardedValues"]["Headers"],
            json!(["Host"])
        );
    }

    #[test]
    fn global_endpoint_record_and_output() {
        let context = context_with(cdn_in("us-east-1"), "prod");
        let mut template = Template::base_resources().unwrap();

        prepare_global_endpoint_record(&mut template, &context).unwrap();

        let properties = &template.resources["ApiGlobalEndpointRecord"]["Properties"];
        assert_eq!(properties["Name"], json!("api.example.com."));
        assert_eq!(properties["HostedZoneName"], json!("example.com."));
        assert!(properties.get("HostedZoneId").is_none());

        let elements = template.output_join_elements_mut("GlobalEndpoint").unwrap();
        assert_eq!(elements[1], json!("api.example.com"));
    }
}
