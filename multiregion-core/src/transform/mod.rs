//! Transform - Specializes the base resources for one region and stage
//!
//! Every rule first decides a typed value from the [`ResolvedContext`]
//! (a hosted zone, a routing policy, an optional certificate, ...) and then
//! writes it into exactly one resource or output. A decision of `None` means
//! the field is absent from the result.
//!
//! The distribution decision runs first: every CDN rule assumes the
//! distribution is part of the template.

pub mod cdn;
pub mod regional;

use std::collections::BTreeSet;

use log::debug;
use serde_json::{Map, Value};

use crate::context::ResolvedContext;
use crate::error::{TransformError, TransformResult};
use crate::template::Template;

/// Logical ids of the bundled resources and outputs
pub mod ids {
    pub const REGIONAL_DOMAIN_NAME: &str = "ApiRegionalDomainName";
    pub const STUB_DEPLOYMENT: &str = "ApiGatewayStubDeployment";
    pub const REGIONAL_BASE_PATH_MAPPING: &str = "ApiRegionalBasePathMapping";
    pub const REGIONAL_ENDPOINT_RECORD: &str = "ApiRegionalEndpointRecord";
    pub const REGIONAL_HEALTH_CHECK: &str = "ApiRegionalHealthCheck";
    pub const DISTRIBUTION: &str = "ApiDistribution";
    pub const GLOBAL_ENDPOINT_RECORD: &str = "ApiGlobalEndpointRecord";

    pub const REGIONAL_ENDPOINT_OUTPUT: &str = "RegionalEndpoint";
    pub const DISTRIBUTION_OUTPUT: &str = "ApiDistribution";
    pub const GLOBAL_ENDPOINT_OUTPUT: &str = "GlobalEndpoint";
}

/// Field defaults that differ between deployments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultsProfile {
    /// Headers forwarded to the origin when none are configured
    pub headers: Vec<String>,
    /// CloudFront price class when none is configured
    pub price_class: String,
}

impl Default for DefaultsProfile {
    fn default() -> Self {
        Self {
            headers: vec!["Accept".to_string(), "Authorization".to_string()],
            price_class: "PriceClass_100".to_string(),
        }
    }
}

impl DefaultsProfile {
    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_price_class(mut self, price_class: impl Into<String>) -> Self {
        self.price_class = price_class.into();
        self
    }
}

/// Certificate ARNs decided before the template is edited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Certificates {
    /// For the regional API Gateway domain name
    pub regional: Option<String>,
    /// For the CloudFront viewer certificate
    pub cdn: Option<String>,
}

/// Applies the rules in order
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    defaults: DefaultsProfile,
}

impl Transformer {
    pub fn new(defaults: DefaultsProfile) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &DefaultsProfile {
        &self.defaults
    }

    /// Produce the specialized template
    ///
    /// Fails if the template lacks a resource a rule relies on, or if a
    /// removed resource is still referenced afterwards.
    pub fn apply(
        &self,
        mut template: Template,
        context: &ResolvedContext,
        certificates: &Certificates,
    ) -> TransformResult<Template> {
        let mut removed = BTreeSet::new();

        let create_distribution = cdn::should_create_distribution(context);
        if !create_distribution {
            cdn::prune_distribution(&mut template, &mut removed);
        }

        regional::prepare_domain_settings(&mut template, context, certificates.regional.as_deref())?;
        regional::prepare_base_path_mapping(&mut template, context)?;
        regional::prepare_endpoint_record(&mut template, context)?;
        regional::prepare_health_check(&mut template, context, &mut removed)?;

        if create_distribution {
            cdn::prepare_distribution(
                &mut template,
                context,
                &self.defaults,
                certificates.cdn.as_deref(),
            )?;
            cdn::prepare_global_endpoint_record(&mut template, context)?;
        }

        check_references(&template, &removed)?;
        debug!(
            "Prepared {} resources and {} outputs",
            template.resources.len(),
            template.outputs.len()
        );
        Ok(template)
    }
}

fn check_references(template: &Template, removed: &BTreeSet<String>) -> TransformResult<()> {
    match template.references_to(removed).into_iter().next() {
        Some(reference) => Err(TransformError::DanglingReference {
            referrer: reference.referrer,
            target: reference.target,
        }),
        None => Ok(()),
    }
}

pub(crate) fn put(map: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    map.insert(key.to_string(), value.into());
}

/// Set `key` when there is a value, otherwise make sure it is absent
pub(crate) fn put_opt<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    match value {
        Some(value) => put(map, key, value),
        None => {
            map.remove(key);
        }
    }
}

/// Nested mapping under `key`, created when missing
pub(crate) fn child_mut<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
    path: &str,
) -> TransformResult<&'a mut Map<String, Value>> {
    map.entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| TransformError::unexpected_shape(path, "a mapping"))
}

/// Replace a join element that already carries a value
pub(crate) fn patch_join_element(elements: &mut [Value], index: usize, value: impl Into<Value>) {
    if let Some(element) = elements.get_mut(index)
        && !is_blank(element)
    {
        *element = value.into();
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
