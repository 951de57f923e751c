//! Compares a fresh probe against the persisted record and merges drift.
//!
//! The decision logic (`evaluate`, `merge`) is pure; persistence goes
//! through `sheet_service`. Records in a batch are processed
//! independently, so one failure never aborts its siblings.

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tracing::{error, info};

use crate::db::entities::tracked_sheet::{HistoryEntry, Model as TrackedSheet};
use crate::db::services::sheet_service;
use crate::sheets::fetcher::{MetadataFetcher, SheetProbe, SheetStatus};
use crate::sheets::metadata::SheetMetadata;

pub const HISTORY_LABEL_ADDED: &str = "added";
pub const HISTORY_LABEL_UPDATED: &str = "updated";

/// What one reconciliation decided. `new_metadata` is populated only when
/// `metadata_changed`, so appliers never overwrite modification fields
/// with stale or absent data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub changed: bool,
    pub metadata_changed: bool,
    pub new_status: SheetStatus,
    pub new_tabs: Vec<String>,
    pub new_metadata: Option<SheetMetadata>,
}

/// Instant comparison of provider timestamps. The provider emits RFC 3339;
/// an unparseable fetched value is treated as not-newer, an unparseable
/// stored value as never-fetched.
fn is_newer(fetched: &str, stored: Option<&str>) -> bool {
    let fetched_at = match DateTime::parse_from_rfc3339(fetched) {
        Ok(t) => t.with_timezone(&Utc),
        Err(_) => return false,
    };
    match stored.and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
        Some(stored_at) => fetched_at > stored_at.with_timezone(&Utc),
        None => true,
    }
}

/// Pure decision step: status and tabs are always recomputed from the
/// probe; the modification fields move only when the provider reported a
/// strictly newer `modifiedTime`.
pub fn evaluate(record: &TrackedSheet, probe: &SheetProbe) -> ReconcileOutcome {
    let metadata_changed = probe
        .metadata
        .fetched()
        .and_then(|meta| meta.modified_time.as_deref())
        .map(|fetched| is_newer(fetched, record.last_modified.as_deref()))
        .unwrap_or(false);

    let changed = metadata_changed
        || probe.status.as_str() != record.status
        || probe.tabs != record.tab_titles();

    ReconcileOutcome {
        changed,
        metadata_changed,
        new_status: probe.status,
        new_tabs: probe.tabs.clone(),
        new_metadata: if metadata_changed {
            probe.metadata.fetched().cloned()
        } else {
            None
        },
    }
}

/// Pure merge step: returns the post-update record plus the history entry
/// to append. Only meaningful when `outcome.changed`.
pub fn merge(
    record: &TrackedSheet,
    outcome: &ReconcileOutcome,
    now: DateTime<Utc>,
) -> (TrackedSheet, HistoryEntry) {
    let mut updated = record.clone();
    updated.status = outcome.new_status.as_str().to_string();
    updated.tabs = serde_json::json!(outcome.new_tabs);
    updated.last_checked = Some(now);

    if let Some(meta) = &outcome.new_metadata {
        updated.last_modified = meta.modified_time.clone();
        updated.last_modified_by = meta.last_user.clone();
        updated.last_modified_email = meta.last_user_email.clone();
    }

    let entry = HistoryEntry {
        timestamp: now.to_rfc3339(),
        last_modified: updated.last_modified.clone(),
        last_modified_by: updated.last_modified_by.clone(),
        last_modified_email: updated.last_modified_email.clone(),
        status: HISTORY_LABEL_UPDATED.to_string(),
    };

    let mut history = updated.history_entries();
    history.push(entry.clone());
    updated.history = serde_json::json!(history);

    (updated, entry)
}

/// Probes and persists one record. Returns the (possibly updated) record
/// and whether anything changed.
pub async fn reconcile(
    db: &DatabaseConnection,
    fetcher: &MetadataFetcher,
    record: TrackedSheet,
) -> Result<(TrackedSheet, bool), sea_orm::DbErr> {
    let probe = fetcher.probe(&record.url).await;
    let outcome = evaluate(&record, &probe);
    if !outcome.changed {
        return Ok((record, false));
    }

    let (updated, _) = merge(&record, &outcome, Utc::now());
    let persisted = sheet_service::apply_reconciliation(db, updated).await?;
    Ok((persisted, true))
}

/// Reconciles every record in the batch, isolating per-record failures.
/// Returns only the records where a change was detected and persisted.
pub async fn reconcile_all(
    db: &DatabaseConnection,
    fetcher: &MetadataFetcher,
    records: Vec<TrackedSheet>,
) -> Vec<TrackedSheet> {
    let mut updated_sheets = Vec::new();
    for record in records {
        let sheet_id = record.id;
        match reconcile(db, fetcher, record).await {
            Ok((updated, true)) => {
                info!(sheet_id = %sheet_id, "Sheet drift detected and persisted.");
                updated_sheets.push(updated);
            }
            Ok((_, false)) => {}
            Err(e) => {
                error!(sheet_id = %sheet_id, error = %e, "Failed to persist reconciliation; continuing batch.");
            }
        }
    }
    updated_sheets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::fetcher::tests::{sample_metadata, MockProber, MockProvider};
    use crate::sheets::fetcher::MetadataOutcome;
    use crate::sheets::metadata::ProviderErrorKind;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};
    use std::sync::Arc;
    use uuid::Uuid;

    fn record(last_modified: Option<&str>, status: &str, tabs: &[&str]) -> TrackedSheet {
        TrackedSheet {
            id: Uuid::new_v4(),
            owner_uid: "uid-1".to_string(),
            name: "Roster".to_string(),
            url: "https://docs.google.com/spreadsheets/d/abc".to_string(),
            added_by: "owner@example.com".to_string(),
            created_at: Utc::now(),
            last_modified: last_modified.map(str::to_string),
            last_modified_by: Some("B. Editor".to_string()),
            last_modified_email: Some("b@example.com".to_string()),
            status: status.to_string(),
            tabs: serde_json::json!(tabs),
            history: serde_json::json!([HistoryEntry {
                timestamp: "2024-01-01T00:00:00+00:00".to_string(),
                last_modified: last_modified.map(str::to_string),
                last_modified_by: Some("B. Editor".to_string()),
                last_modified_email: Some("b@example.com".to_string()),
                status: HISTORY_LABEL_ADDED.to_string(),
            }]),
            last_checked: None,
        }
    }

    fn probe(metadata: MetadataOutcome, status: SheetStatus, tabs: &[&str]) -> SheetProbe {
        SheetProbe {
            metadata,
            status,
            tabs: tabs.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_unchanged_record_is_idempotent() {
        let rec = record(Some("2024-01-01T00:00:00Z"), "reachable", &["Data"]);
        let pr = probe(
            MetadataOutcome::Fetched(sample_metadata("2024-01-01T00:00:00Z")),
            SheetStatus::Reachable,
            &["Data"],
        );

        let outcome = evaluate(&rec, &pr);
        assert!(!outcome.changed);
        assert!(!outcome.metadata_changed);
    }

    #[test]
    fn test_newer_modified_time_updates_fields_and_history() {
        let rec = record(Some("2024-01-01T00:00:00Z"), "reachable", &["Data"]);
        let pr = probe(
            MetadataOutcome::Fetched(sample_metadata("2024-02-01T00:00:00Z")),
            SheetStatus::Reachable,
            &["Data"],
        );

        let outcome = evaluate(&rec, &pr);
        assert!(outcome.changed);
        assert!(outcome.metadata_changed);

        let now = Utc::now();
        let (updated, entry) = merge(&rec, &outcome, now);
        assert_eq!(updated.last_modified.as_deref(), Some("2024-02-01T00:00:00Z"));
        assert_eq!(updated.last_modified_by.as_deref(), Some("A. Editor"));
        assert_eq!(updated.last_checked, Some(now));
        assert_eq!(entry.status, HISTORY_LABEL_UPDATED);

        let history = updated.history_entries();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, HISTORY_LABEL_ADDED);
        assert_eq!(
            history[1].last_modified.as_deref(),
            Some("2024-02-01T00:00:00Z")
        );
    }

    #[test]
    fn test_status_flip_alone_marks_changed() {
        let rec = record(Some("2024-01-01T00:00:00Z"), "reachable", &["Data"]);
        let pr = probe(
            MetadataOutcome::Fetched(sample_metadata("2024-01-01T00:00:00Z")),
            SheetStatus::Unreachable,
            &["Data"],
        );

        let outcome = evaluate(&rec, &pr);
        assert!(outcome.changed);
        assert!(!outcome.metadata_changed);

        let (updated, _) = merge(&rec, &outcome, Utc::now());
        assert_eq!(updated.status, "unreachable");
        // Modification fields must not move on a status-only change.
        assert_eq!(updated.last_modified.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_tab_change_alone_marks_changed() {
        let rec = record(Some("2024-01-01T00:00:00Z"), "reachable", &["Data"]);
        let pr = probe(
            MetadataOutcome::Fetched(sample_metadata("2024-01-01T00:00:00Z")),
            SheetStatus::Reachable,
            &["Data", "Archive"],
        );

        let outcome = evaluate(&rec, &pr);
        assert!(outcome.changed);
        assert!(!outcome.metadata_changed);

        let (updated, _) = merge(&rec, &outcome, Utc::now());
        assert_eq!(updated.tab_titles(), vec!["Data", "Archive"]);
    }

    #[test]
    fn test_provider_failure_keeps_modification_fields() {
        let rec = record(Some("2024-01-01T00:00:00Z"), "reachable", &["Data"]);
        let pr = probe(
            MetadataOutcome::Failed(ProviderErrorKind::Network("timeout".to_string())),
            SheetStatus::Unreachable,
            &[],
        );

        let outcome = evaluate(&rec, &pr);
        assert!(outcome.changed);
        assert!(!outcome.metadata_changed);

        let (updated, _) = merge(&rec, &outcome, Utc::now());
        assert_eq!(updated.status, "unreachable");
        assert!(updated.tab_titles().is_empty());
        assert_eq!(updated.last_modified.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_never_fetched_record_accepts_first_metadata() {
        let rec = record(None, "unknown", &[]);
        let pr = probe(
            MetadataOutcome::Fetched(sample_metadata("2024-02-01T00:00:00Z")),
            SheetStatus::Reachable,
            &["Data"],
        );

        let outcome = evaluate(&rec, &pr);
        assert!(outcome.metadata_changed);
    }

    #[tokio::test]
    async fn test_reconcile_all_continues_batch_after_persistence_error() {
        let first = record(Some("2024-01-01T00:00:00Z"), "reachable", &["Data"]);
        let second = record(Some("2024-01-01T00:00:00Z"), "reachable", &["Data"]);
        let second_id = second.id;

        // Provider reports a newer modifiedTime, so both records need a write.
        let fetcher = MetadataFetcher::new(
            Arc::new(MockProvider {
                metadata: Ok(sample_metadata("2024-03-01T00:00:00Z")),
                tabs: Ok(vec!["Data".to_string()]),
            }),
            Arc::new(MockProber { reachable: true }),
        );

        let mut persisted_second = second.clone();
        persisted_second.last_modified = Some("2024-03-01T00:00:00Z".to_string());

        // The first update fails at the database; the second succeeds.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection closed".to_string())])
            .append_query_results([[persisted_second]])
            .into_connection();

        let updated = reconcile_all(&db, &fetcher, vec![first, second]).await;
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].id, second_id);
        assert_eq!(
            updated[0].last_modified.as_deref(),
            Some("2024-03-01T00:00:00Z")
        );
    }

    #[test]
    fn test_is_newer_parses_instants_not_strings() {
        // Same instant, different offset spelling: lexical comparison would
        // call this newer, instant comparison must not.
        assert!(!is_newer(
            "2024-01-01T01:00:00+01:00",
            Some("2024-01-01T00:00:00Z")
        ));
        assert!(is_newer("2024-02-01T00:00:00Z", Some("2024-01-01T00:00:00Z")));
        assert!(!is_newer("2024-01-01T00:00:00Z", Some("2024-02-01T00:00:00Z")));
        assert!(is_newer("2024-01-01T00:00:00Z", None));
        // Unparseable fetched value is not-newer.
        assert!(!is_newer("not-a-timestamp", Some("2024-01-01T00:00:00Z")));
        // Unparseable stored value counts as never-fetched.
        assert!(is_newer("2024-01-01T00:00:00Z", Some("garbage")));
    }
}
