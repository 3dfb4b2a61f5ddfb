//! Preparer - Runs the whole preparation for one invocation
//!
//! Resolve the context (or skip), look up certificates, apply the rules,
//! and only then hand the result to the caller's template.

use log::{debug, info};

use crate::certificate::CertificateResolver;
use crate::config::ServiceConfig;
use crate::context::{InvocationOptions, NamingConvention, ResolvedContext, SkipReason};
use crate::error::{TransformError, TransformResult};
use crate::inventory::CertificateInventory;
use crate::template::Template;
use crate::transform::{Certificates, DefaultsProfile, Transformer, cdn, regional};

/// Outcome of a preparation
#[derive(Debug, Clone, PartialEq)]
pub enum Preparation {
    /// Nothing was done; the reason has been logged
    Skipped(SkipReason),
    /// The fully specialized resources
    Prepared(Template),
}

impl Preparation {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Preparation::Skipped(_))
    }

    pub fn template(&self) -> Option<&Template> {
        match self {
            Preparation::Prepared(template) => Some(template),
            Preparation::Skipped(_) => None,
        }
    }
}

/// Prepares the multi-regional resources against a certificate inventory
pub struct Preparer<I> {
    inventory: I,
    naming: NamingConvention,
    transformer: Transformer,
}

impl<I: CertificateInventory> Preparer<I> {
    pub fn new(inventory: I) -> Self {
        Self {
            inventory,
            naming: NamingConvention::default(),
            transformer: Transformer::default(),
        }
    }

    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_defaults(mut self, defaults: DefaultsProfile) -> Self {
        self.transformer = Transformer::new(defaults);
        self
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    pub fn naming(&self) -> NamingConvention {
        self.naming
    }

    /// Specialize `resources` for the given region and stage
    ///
    /// Skip conditions are checked before any certificate lookup.
    pub async fn prepare(
        &self,
        resources: Template,
        config: &ServiceConfig,
        options: &InvocationOptions,
    ) -> TransformResult<Preparation> {
        let context = match ResolvedContext::resolve(config, options, self.naming) {
            Ok(context) => context,
            Err(reason) => {
                info!("{}", reason);
                return Ok(Preparation::Skipped(reason));
            }
        };
        debug!(
            "Preparing {} (regional {}) for {} in {}",
            context.full_domain_name, context.regional_domain_name, context.stage, context.region
        );

        let certificates = self.resolve_certificates(&context).await?;
        let template = self.transformer.apply(resources, &context, &certificates)?;
        Ok(Preparation::Prepared(template))
    }

    /// Prepare `resources` and deep-merge them into `master`
    ///
    /// `master` is left untouched when the preparation is skipped or fails.
    pub async fn create_deployment_artifacts(
        &self,
        master: &mut Template,
        resources: Template,
        config: &ServiceConfig,
        options: &InvocationOptions,
    ) -> TransformResult<Preparation> {
        let preparation = self.prepare(resources, config, options).await?;

        if let Preparation::Prepared(ref template) = preparation {
            if let Ok(yaml) = template.to_yaml() {
                debug!("The multi-regional resources were prepared:\n{}", yaml);
            }
            master.merge_from(template.clone());
            info!(
                "Merged {} multi-regional resources into the template",
                template.resources.len()
            );
        }

        Ok(preparation)
    }

    /// Decide both certificates; the two lookups run concurrently and share
    /// one inventory snapshot
    async fn resolve_certificates(&self, context: &ResolvedContext) -> TransformResult<Certificates> {
        let resolver = CertificateResolver::new(&self.inventory);

        let regional = async {
            match regional::explicit_certificate(context) {
                Some(arn) => Ok::<_, TransformError>(Some(arn.to_string())),
                None => resolver.resolve(&context.host_name).await,
            }
        };

        let cdn = async {
            if !cdn::should_create_distribution(context) {
                return Ok::<_, TransformError>(None);
            }
            match cdn::explicit_certificate(context) {
                Some(arn) => Ok(Some(arn.to_string())),
                None => resolver.resolve(&context.host_name).await,
            }
        };

        let (regional, cdn) = tokio::join!(regional, cdn);
        Ok(Certificates {
            regional: regional?,
            cdn: cdn?,
        })
    }
}
