//! Read-only probe of one spreadsheet URL: metadata, reachability, tabs.
//!
//! The three legs are independent; a failure in one never taints the
//! others, and `probe` itself is infallible so a bad record can never
//! abort a reconciliation batch.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::sheets::metadata::{ProviderErrorKind, SheetMetadata, SpreadsheetProvider};

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of the reachability leg, persisted as text on the record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SheetStatus {
    Reachable,
    Unreachable,
    Unknown,
}

impl SheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetStatus::Reachable => "reachable",
            SheetStatus::Unreachable => "unreachable",
            SheetStatus::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "reachable" => SheetStatus::Reachable,
            "unreachable" => SheetStatus::Unreachable,
            _ => SheetStatus::Unknown,
        }
    }
}

/// Three-way outcome of the metadata leg. `Absent` means the URL carried
/// no recognizable spreadsheet id (a parsing contract, not an error);
/// `Failed` keeps the provider error kind for logging and future retry
/// logic. Reconciliation treats both non-`Fetched` arms as "no metadata".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataOutcome {
    Fetched(SheetMetadata),
    Absent,
    Failed(ProviderErrorKind),
}

impl MetadataOutcome {
    pub fn fetched(&self) -> Option<&SheetMetadata> {
        match self {
            MetadataOutcome::Fetched(meta) => Some(meta),
            _ => None,
        }
    }
}

/// Everything one probe learned about a spreadsheet URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetProbe {
    pub metadata: MetadataOutcome,
    pub status: SheetStatus,
    pub tabs: Vec<String>,
}

/// Strips trailing slashes; applied once, at record creation.
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Extracts the spreadsheet id from the `/d/<id>/` path segment.
pub fn extract_sheet_id(url: &str) -> Option<&str> {
    let rest = url.split_once("/d/")?.1;
    let id = rest.split('/').next().unwrap_or(rest);
    if id.is_empty() { None } else { Some(id) }
}

#[async_trait]
pub trait ReachabilityProber: Send + Sync {
    async fn is_reachable(&self, url: &str) -> bool;
}

/// HEAD-request prober with a short timeout; connection failures and
/// non-2xx responses both classify as unreachable.
pub struct HttpProber {
    client: reqwest::Client,
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProber {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REACHABILITY_TIMEOUT)
            .build()
            .unwrap(); // Should not fail with default settings
        Self { client }
    }
}

#[async_trait]
impl ReachabilityProber for HttpProber {
    async fn is_reachable(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Probes a spreadsheet URL against the injected provider and prober.
pub struct MetadataFetcher {
    provider: Arc<dyn SpreadsheetProvider>,
    prober: Arc<dyn ReachabilityProber>,
}

impl MetadataFetcher {
    pub fn new(provider: Arc<dyn SpreadsheetProvider>, prober: Arc<dyn ReachabilityProber>) -> Self {
        Self { provider, prober }
    }

    pub async fn probe(&self, url: &str) -> SheetProbe {
        let sheet_id = extract_sheet_id(url);

        let metadata = match sheet_id {
            None => MetadataOutcome::Absent,
            Some(id) => match self.provider.file_metadata(id).await {
                Ok(meta) => MetadataOutcome::Fetched(meta),
                Err(kind) => {
                    debug!(url = url, error = %kind, "Metadata fetch degraded to absent.");
                    MetadataOutcome::Failed(kind)
                }
            },
        };

        let status = if self.prober.is_reachable(url).await {
            SheetStatus::Reachable
        } else {
            SheetStatus::Unreachable
        };

        // Tabs default to empty on any failure, distinct from "unknown".
        let tabs = match sheet_id {
            None => Vec::new(),
            Some(id) => self.provider.tab_titles(id).await.unwrap_or_default(),
        };

        SheetProbe {
            metadata,
            status,
            tabs,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct MockProvider {
        pub metadata: Result<SheetMetadata, ProviderErrorKind>,
        pub tabs: Result<Vec<String>, ProviderErrorKind>,
    }

    #[async_trait]
    impl SpreadsheetProvider for MockProvider {
        async fn file_metadata(&self, _sheet_id: &str) -> Result<SheetMetadata, ProviderErrorKind> {
            self.metadata.clone()
        }

        async fn tab_titles(&self, _sheet_id: &str) -> Result<Vec<String>, ProviderErrorKind> {
            self.tabs.clone()
        }
    }

    pub(crate) struct MockProber {
        pub reachable: bool,
    }

    #[async_trait]
    impl ReachabilityProber for MockProber {
        async fn is_reachable(&self, _url: &str) -> bool {
            self.reachable
        }
    }

    pub(crate) fn sample_metadata(modified: &str) -> SheetMetadata {
        SheetMetadata {
            modified_time: Some(modified.to_string()),
            last_user: Some("A. Editor".to_string()),
            last_user_email: Some("editor@example.com".to_string()),
        }
    }

    fn fetcher(provider: MockProvider, prober: MockProber) -> MetadataFetcher {
        MetadataFetcher::new(Arc::new(provider), Arc::new(prober))
    }

    #[test]
    fn test_extract_sheet_id() {
        assert_eq!(
            extract_sheet_id("https://docs.google.com/spreadsheets/d/abc123/edit#gid=0"),
            Some("abc123")
        );
        assert_eq!(
            extract_sheet_id("https://docs.google.com/spreadsheets/d/abc123"),
            Some("abc123")
        );
        assert_eq!(extract_sheet_id("https://example.com/no-id-here"), None);
        assert_eq!(extract_sheet_id("https://example.com/d/"), None);
    }

    #[test]
    fn test_normalize_url_strips_trailing_slashes() {
        assert_eq!(
            normalize_url("https://docs.google.com/spreadsheets/d/abc/"),
            "https://docs.google.com/spreadsheets/d/abc"
        );
        assert_eq!(normalize_url("https://example.com///"), "https://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!(SheetStatus::from_str("reachable"), SheetStatus::Reachable);
        assert_eq!(SheetStatus::from_str("unreachable"), SheetStatus::Unreachable);
        assert_eq!(SheetStatus::from_str("anything-else"), SheetStatus::Unknown);
    }

    #[tokio::test]
    async fn test_probe_without_sheet_id_returns_absent_and_empty_tabs() {
        // Provider answers would succeed, but the URL has no /d/<id>/ segment,
        // so neither provider leg may be consulted.
        let f = fetcher(
            MockProvider {
                metadata: Ok(sample_metadata("2024-02-01T00:00:00Z")),
                tabs: Ok(vec!["Data".to_string()]),
            },
            MockProber { reachable: true },
        );

        let probe = f.probe("https://example.com/plain-page").await;
        assert_eq!(probe.metadata, MetadataOutcome::Absent);
        assert_eq!(probe.status, SheetStatus::Reachable);
        assert!(probe.tabs.is_empty());
    }

    #[tokio::test]
    async fn test_probe_degrades_each_leg_independently() {
        let f = fetcher(
            MockProvider {
                metadata: Err(ProviderErrorKind::PermissionDenied),
                tabs: Err(ProviderErrorKind::Network("connection reset".to_string())),
            },
            MockProber { reachable: true },
        );

        let probe = f.probe("https://docs.google.com/spreadsheets/d/abc/edit").await;
        assert_eq!(
            probe.metadata,
            MetadataOutcome::Failed(ProviderErrorKind::PermissionDenied)
        );
        // Reachability is independent of the provider failures.
        assert_eq!(probe.status, SheetStatus::Reachable);
        assert!(probe.tabs.is_empty());
    }

    #[tokio::test]
    async fn test_probe_unreachable_with_good_metadata() {
        let f = fetcher(
            MockProvider {
                metadata: Ok(sample_metadata("2024-02-01T00:00:00Z")),
                tabs: Ok(vec!["Overview".to_string(), "Data".to_string()]),
            },
            MockProber { reachable: false },
        );

        let probe = f.probe("https://docs.google.com/spreadsheets/d/abc/edit").await;
        assert!(probe.metadata.fetched().is_some());
        assert_eq!(probe.status, SheetStatus::Unreachable);
        assert_eq!(probe.tabs, vec!["Overview", "Data"]);
    }
}
