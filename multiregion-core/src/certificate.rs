//! Certificate - Finds the certificate that best covers a host name

use log::{debug, info};
use tokio::sync::OnceCell;

use crate::error::{TransformError, TransformResult};
use crate::inventory::{CertificateInventory, CertificateStatus, CertificateSummary};

/// Strip a leading wildcard label (`*.`) from a certificate domain pattern
pub fn strip_wildcard(pattern: &str) -> &str {
    pattern.strip_prefix("*.").unwrap_or(pattern)
}

/// Select the most specific certificate for `host_name`
///
/// A certificate is a candidate when its pattern, without the wildcard
/// label, is non-empty and contained in the host name. The longest pattern
/// wins; on equal length the first one listed is kept.
pub fn best_match<'a>(
    host_name: &str,
    certificates: &'a [CertificateSummary],
) -> Option<&'a CertificateSummary> {
    let mut best: Option<(&CertificateSummary, usize)> = None;

    for certificate in certificates {
        let pattern = strip_wildcard(&certificate.domain_name);
        if pattern.is_empty() || !host_name.contains(pattern) {
            continue;
        }
        match best {
            Some((_, length)) if pattern.len() <= length => {}
            _ => best = Some((certificate, pattern.len())),
        }
    }

    best.map(|(certificate, _)| certificate)
}

/// Resolves certificate ARNs against an inventory
///
/// The inventory snapshot is fetched at most once per resolver, so the
/// regional and CDN lookups of one invocation share a single request.
pub struct CertificateResolver<'a> {
    inventory: &'a dyn CertificateInventory,
    snapshot: OnceCell<Vec<CertificateSummary>>,
}

impl<'a> CertificateResolver<'a> {
    pub fn new(inventory: &'a dyn CertificateInventory) -> Self {
        Self {
            inventory,
            snapshot: OnceCell::new(),
        }
    }

    /// ARN of the best certificate for `host_name`, or `None` when nothing matches
    pub async fn resolve(&self, host_name: &str) -> TransformResult<Option<String>> {
        let certificates = self
            .snapshot
            .get_or_try_init(|| async {
                debug!(
                    "Listing certificates from the {} inventory",
                    self.inventory.name()
                );
                self.inventory
                    .list_certificates(&CertificateStatus::USABLE)
                    .await
            })
            .await
            .map_err(|cause| TransformError::CertificateLookupFailed {
                host_name: host_name.to_string(),
                cause,
            })?;

        let arn = best_match(host_name, certificates).map(|c| c.certificate_arn.clone());
        if let Some(ref arn) = arn {
            info!(
                "The host name {} resolved to the following certificateArn: {}",
                host_name, arn
            );
        }
        Ok(arn)
    }
}
