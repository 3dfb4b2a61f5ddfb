//! Inventory - Trait abstracting the certificate store
//!
//! A CertificateInventory lists the certificates known to an external store
//! (ACM, a fixture file, etc.). The core only ever reads snapshots from it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Error type for inventory operations
#[derive(Debug)]
pub struct InventoryError {
    pub message: String,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cause {
            Some(ref cause) => write!(f, "{}\n{}", self.message, cause),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for InventoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl InventoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Certificate lifecycle states the inventory can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateStatus {
    PendingValidation,
    Issued,
    Inactive,
    Expired,
    Revoked,
    Failed,
}

impl CertificateStatus {
    /// States whose certificates are considered for lookups
    pub const USABLE: [CertificateStatus; 3] = [
        CertificateStatus::PendingValidation,
        CertificateStatus::Issued,
        CertificateStatus::Inactive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::PendingValidation => "PENDING_VALIDATION",
            CertificateStatus::Issued => "ISSUED",
            CertificateStatus::Inactive => "INACTIVE",
            CertificateStatus::Expired => "EXPIRED",
            CertificateStatus::Revoked => "REVOKED",
            CertificateStatus::Failed => "FAILED",
        }
    }
}

/// One certificate as seen by the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    /// Domain pattern, possibly with a leading wildcard (e.g., "*.example.com")
    pub domain_name: String,
    pub certificate_arn: String,
    pub status: CertificateStatus,
}

impl CertificateSummary {
    pub fn new(domain_name: impl Into<String>, certificate_arn: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            certificate_arn: certificate_arn.into(),
            status: CertificateStatus::Issued,
        }
    }

    pub fn with_status(mut self, status: CertificateStatus) -> Self {
        self.status = status;
        self
    }
}

/// Source of certificate snapshots
///
/// Implementations return the certificates whose status is one of
/// `statuses`, in the order the store reports them.
pub trait CertificateInventory: Send + Sync {
    /// Name of this inventory (e.g., "acm")
    fn name(&self) -> &'static str;

    fn list_certificates(
        &self,
        statuses: &[CertificateStatus],
    ) -> BoxFuture<'_, InventoryResult<Vec<CertificateSummary>>>;
}

/// Enables dynamic dispatch for inventories
impl CertificateInventory for Box<dyn CertificateInventory> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn list_certificates(
        &self,
        statuses: &[CertificateStatus],
    ) -> BoxFuture<'_, InventoryResult<Vec<CertificateSummary>>> {
        (**self).list_certificates(statuses)
    }
}

/// In-memory inventory
///
/// Used for offline runs and tests. Counts how many times it was queried.
#[derive(Debug, Default)]
pub struct StaticInventory {
    certificates: Vec<CertificateSummary>,
    calls: AtomicUsize,
}

impl StaticInventory {
    pub fn new(certificates: Vec<CertificateSummary>) -> Self {
        Self {
            certificates,
            calls: AtomicUsize::new(0),
        }
    }

    /// An inventory with no certificates at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of `list_certificates` calls served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CertificateInventory for StaticInventory {
    fn name(&self) -> &'static str {
        "static"
    }

    fn list_certificates(
        &self,
        statuses: &[CertificateStatus],
    ) -> BoxFuture<'_, InventoryResult<Vec<CertificateSummary>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let certificates = self
            .certificates
            .iter()
            .filter(|c| statuses.contains(&c.status))
            .cloned()
            .collect();
        Box::pin(async move { Ok(certificates) })
    }
}
