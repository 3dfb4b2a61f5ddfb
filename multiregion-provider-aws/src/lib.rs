//! Multiregion AWS Provider
//!
//! Certificate inventory backed by AWS Certificate Manager

use aws_config::Region;
use aws_sdk_acm::Client as AcmClient;
use aws_sdk_acm::types::{
    CertificateStatus as AcmCertificateStatus, CertificateSummary as AcmCertificateSummary,
};
use log::debug;
use multiregion_core::inventory::{
    BoxFuture, CertificateInventory, CertificateStatus, CertificateSummary, InventoryError,
    InventoryResult,
};

/// ACM certificate inventory for one region
pub struct AcmInventory {
    client: AcmClient,
    region: String,
}

impl AcmInventory {
    /// Create an inventory using the default credential chain
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            client: AcmClient::new(&config),
            region: region.to_string(),
        }
    }

    /// Create with a specific client (for testing)
    pub fn with_client(client: AcmClient, region: String) -> Self {
        Self { client, region }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// List every certificate in the given states, following pagination
    async fn list_all(
        &self,
        statuses: Vec<AcmCertificateStatus>,
    ) -> InventoryResult<Vec<CertificateSummary>> {
        let mut certificates = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_certificates()
                .set_certificate_statuses(Some(statuses.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    InventoryError::new(format!(
                        "Could not list certificates in Certificate Manager ({})",
                        self.region
                    ))
                    .with_cause(aws_sdk_acm::Error::from(e))
                })?;

            certificates.extend(
                output
                    .certificate_summary_list()
                    .iter()
                    .filter_map(summary_from_acm),
            );

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(
            "Found {} certificates in {}",
            certificates.len(),
            self.region
        );
        Ok(certificates)
    }
}

impl CertificateInventory for AcmInventory {
    fn name(&self) -> &'static str {
        "acm"
    }

    fn list_certificates(
        &self,
        statuses: &[CertificateStatus],
    ) -> BoxFuture<'_, InventoryResult<Vec<CertificateSummary>>> {
        let statuses: Vec<AcmCertificateStatus> = statuses.iter().map(to_acm_status).collect();
        Box::pin(async move { self.list_all(statuses).await })
    }
}

/// Convert a status filter to the SDK's enum
pub fn to_acm_status(status: &CertificateStatus) -> AcmCertificateStatus {
    match status {
        CertificateStatus::PendingValidation => AcmCertificateStatus::PendingValidation,
        CertificateStatus::Issued => AcmCertificateStatus::Issued,
        CertificateStatus::Inactive => AcmCertificateStatus::Inactive,
        CertificateStatus::Expired => AcmCertificateStatus::Expired,
        CertificateStatus::Revoked => AcmCertificateStatus::Revoked,
        CertificateStatus::Failed => AcmCertificateStatus::Failed,
    }
}

/// Convert an SDK status; statuses without a counterpart count as failed
pub fn from_acm_status(status: &AcmCertificateStatus) -> CertificateStatus {
    match status {
        AcmCertificateStatus::PendingValidation => CertificateStatus::PendingValidation,
        AcmCertificateStatus::Issued => CertificateStatus::Issued,
        AcmCertificateStatus::Inactive => CertificateStatus::Inactive,
        AcmCertificateStatus::Expired => CertificateStatus::Expired,
        AcmCertificateStatus::Revoked => CertificateStatus::Revoked,
        _ => CertificateStatus::Failed,
    }
}

/// Convert an SDK summary, skipping entries without a domain name or ARN
pub fn summary_from_acm(summary: &AcmCertificateSummary) -> Option<CertificateSummary> {
    let domain_name = summary.domain_name()?;
    let arn = summary.certificate_arn()?;
    let status = summary
        .status()
        .map(from_acm_status)
        .unwrap_or(CertificateStatus::Issued);
    Some(CertificateSummary::new(domain_name, arn).with_status(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_for_usable_states() {
        for status in CertificateStatus::USABLE {
            assert_eq!(from_acm_status(&to_acm_status(&status)), status);
        }
        assert_eq!(
            to_acm_status(&CertificateStatus::PendingValidation).as_str(),
            "PENDING_VALIDATION"
        );
    }

    #[test]
    fn test_unknown_status_counts_as_failed() {
        assert_eq!(
            from_acm_status(&AcmCertificateStatus::ValidationTimedOut),
            CertificateStatus::Failed
        );
    }

    #[test]
    fn test_summary_from_acm() {
        let summary = AcmCertificateSummary::builder()
            .domain_name("*.example.com")
            .certificate_arn("arn:aws:acm:us-east-1:123:certificate/abc")
            .status(AcmCertificateStatus::PendingValidation)
            .build();

        let converted = summary_from_acm(&summary).unwrap();
        assert_eq!(converted.domain_name, "*.example.com");
        assert_eq!(
            converted.certificate_arn,
            "arn:aws:acm:us-east-1:123:certificate/abc"
        );
        assert_eq!(converted.status, CertificateStatus::PendingValidation);
    }

    #[test]
    fn test_summary_without_arn_is_skipped() {
        let summary = AcmCertificateSummary::builder()
            .domain_name("example.com")
            .build();
        assert!(summary_from_acm(&summary).is_none());
    }

    #[test]
    fn test_inventory_with_client() {
        let config = aws_sdk_acm::Config::builder()
            .region(Region::new("us-east-1"))
            .behavior_version(aws_config::BehaviorVersion::latest())
            .build();
        let inventory =
            AcmInventory::with_client(AcmClient::from_conf(config), "us-east-1".to_string());

        assert_eq!(inventory.name(), "acm");
        assert_eq!(inventory.region(), "us-east-1");
    }
}
