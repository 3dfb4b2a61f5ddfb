//! Loader - Reads templates, service descriptions and certificate fixtures
//! from disk

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::{ServiceConfig, ServiceDescription};
use crate::error::{LoadError, LoadResult};
use crate::inventory::{CertificateStatus, CertificateSummary};
use crate::template::Template;

fn read(path: &Path) -> LoadResult<String> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Load a template; `.json` files are read as JSON, anything else as YAML
pub fn load_template(path: &Path) -> LoadResult<Template> {
    let content = read(path)?;
    if is_json(path) {
        Template::from_json_str(&content)
    } else {
        Template::from_yaml_str(&content)
    }
}

/// Parse a service description
///
/// Accepts a full service file (`service:` plus a `custom:` section) or a
/// bare mapping holding only the `dns` / `cdn` sections.
pub fn parse_service_description(content: &str) -> LoadResult<ServiceDescription> {
    let value: serde_yaml::Value = serde_yaml::from_str(content)?;
    let wrapped = value.get("custom").is_some() || value.get("service").is_some();

    if wrapped {
        Ok(serde_yaml::from_value(value)?)
    } else if value.is_null() {
        Ok(ServiceDescription::default())
    } else {
        let custom: ServiceConfig = serde_yaml::from_value(value)?;
        Ok(ServiceDescription {
            service: None,
            custom,
        })
    }
}

pub fn load_service_description(path: &Path) -> LoadResult<ServiceDescription> {
    parse_service_description(&read(path)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateEntry {
    domain_name: String,
    certificate_arn: String,
    #[serde(default)]
    status: Option<String>,
}

fn parse_status(status: Option<&str>) -> CertificateStatus {
    match status.map(str::to_uppercase).as_deref() {
        Some("PENDING_VALIDATION") => CertificateStatus::PendingValidation,
        Some("INACTIVE") => CertificateStatus::Inactive,
        Some("EXPIRED") => CertificateStatus::Expired,
        Some("REVOKED") => CertificateStatus::Revoked,
        Some("FAILED") => CertificateStatus::Failed,
        _ => CertificateStatus::Issued,
    }
}

/// Parse a list of certificates (`domainName`, `certificateArn`, optional `status`)
pub fn parse_certificates(content: &str) -> LoadResult<Vec<CertificateSummary>> {
    let entries: Vec<CertificateEntry> = serde_yaml::from_str(content)?;
    Ok(entries
        .into_iter()
        .map(|entry| {
            CertificateSummary::new(entry.domain_name, entry.certificate_arn)
                .with_status(parse_status(entry.status.as_deref()))
        })
        .collect())
}

pub fn load_certificates(path: &Path) -> LoadResult<Vec<CertificateSummary>> {
    parse_certificates(&read(path)?)
}
