use crate::config::{ColumnMap, RosterSource};
use crate::phone::PhoneNumber;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A successful roster match. Fields missing from the underlying row default
/// to "Unknown" rather than failing the match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRecord {
    pub name: String,
    pub email: String,
    pub gender: String,
    pub region: String,
}

/// Outcome of a roster search.
///
/// `SourceUnavailable` is deliberately distinct from `NotFound`: an
/// infrastructure failure must never be presented (or acted on) as a
/// genuine non-membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(RosterRecord),
    NotFound,
    SourceUnavailable,
}

/// Read-only access to one external roster table. Implementations wrap the
/// actual spreadsheet transport; the engine never writes.
#[async_trait]
pub trait RosterConnector: Send + Sync {
    /// Fetch all rows of the given sheet, optionally narrowed to a named
    /// partition (sub-sheet). Rows are ordered sequences of cell strings.
    async fn fetch_rows(
        &self,
        sheet_id: &str,
        partition: Option<&str>,
    ) -> anyhow::Result<Vec<Vec<String>>>;
}

pub struct RosterLookup {
    connector: Arc<dyn RosterConnector>,
    max_retries: u32,
    columns: ColumnMap,
}

impl RosterLookup {
    pub fn new(connector: Arc<dyn RosterConnector>, max_retries: u32, columns: ColumnMap) -> Self {
        RosterLookup {
            connector,
            max_retries,
            columns,
        }
    }

    /// Search the sources in order for the given number.
    ///
    /// Each source gets up to `max_retries + 1` fetch attempts; a source that
    /// never loads is marked unavailable and the search moves on. The first
    /// matching row anywhere ends the whole search: sources are not merged,
    /// and the earliest-declared source is authoritative when several could
    /// match. Transport errors never escape this function; they degrade to
    /// `SourceUnavailable` when no readable source produced a verdict.
    pub async fn lookup(&self, number: &PhoneNumber, sources: &[RosterSource]) -> LookupOutcome {
        log::debug!("Searching {} source(s) for number {number}", sources.len());
        // Set when a source exhausts its retries; cleared again if a later
        // source loads, since that source then speaks for the search.
        let mut unavailable = false;

        for source in sources {
            match self.fetch_with_retry(source).await {
                Some(rows) => {
                    unavailable = false;
                    if let Some(record) = self.scan_rows(number, &rows) {
                        log::info!(
                            "Number {number} found in sheet {}/{} (name: {})",
                            source.sheet_id,
                            source.partition.as_deref().unwrap_or("-"),
                            record.name
                        );
                        return LookupOutcome::Found(record);
                    }
                }
                None => {
                    unavailable = true;
                }
            }
        }

        if unavailable {
            log::warn!("Roster sources unavailable while searching for {number}");
            return LookupOutcome::SourceUnavailable;
        }
        log::info!("Number {number} not found in any roster source");
        LookupOutcome::NotFound
    }

    async fn fetch_with_retry(&self, source: &RosterSource) -> Option<Vec<Vec<String>>> {
        let partition = source.partition.as_deref();
        for attempt in 0..=self.max_retries {
            match self.connector.fetch_rows(&source.sheet_id, partition).await {
                Ok(rows) => return Some(rows),
                Err(e) => {
                    log::warn!(
                        "Error reading sheet {}/{} (attempt {}): {e}",
                        source.sheet_id,
                        partition.unwrap_or("-"),
                        attempt + 1
                    );
                }
            }
        }
        log::error!(
            "Failed to read sheet {}/{} after {} attempts",
            source.sheet_id,
            partition.unwrap_or("-"),
            self.max_retries + 1
        );
        None
    }

    fn scan_rows(&self, number: &PhoneNumber, rows: &[Vec<String>]) -> Option<RosterRecord> {
        for row in rows {
            let Some(cell) = row.get(self.columns.phone) else {
                continue;
            };
            let row_number = PhoneNumber::normalize(cell);
            if row_number.matches(number) {
                return Some(RosterRecord {
                    name: field(row, self.columns.name),
                    email: field(row, self.columns.email),
                    gender: field(row, self.columns.gender),
                    region: field(row, self.columns.region),
                });
            }
        }
        None
    }
}

fn field(row: &[String], index: usize) -> String {
    match row.get(index) {
        Some(cell) if !cell.is_empty() => cell.clone(),
        _ => "Unknown".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// In-memory connector: a map from sheet id to rows, with optional
    /// per-sheet failure injection.
    pub(crate) struct FakeConnector {
        pub sheets: Vec<(String, Vec<Vec<String>>)>,
        pub failing: Vec<String>,
        pub attempts: AtomicU32,
    }

    impl FakeConnector {
        pub fn with_sheets(sheets: Vec<(String, Vec<Vec<String>>)>) -> Self {
            FakeConnector {
                sheets,
                failing: vec![],
                attempts: AtomicU32::new(0),
            }
        }

        pub fn all_failing() -> Self {
            FakeConnector {
                sheets: vec![],
                failing: vec!["*".to_string()],
                attempts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl RosterConnector for FakeConnector {
        async fn fetch_rows(
            &self,
            sheet_id: &str,
            _partition: Option<&str>,
        ) -> anyhow::Result<Vec<Vec<String>>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|f| f == "*" || f == sheet_id) {
                anyhow::bail!("transport error reading {sheet_id}");
            }
            Ok(self
                .sheets
                .iter()
                .find(|(id, _)| id == sheet_id)
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default())
        }
    }

    pub(crate) fn row(phone: &str, name: &str) -> Vec<String> {
        // Matches the default ColumnMap: B=name, C=email, D=phone, E=gender, G=region.
        vec![
            String::new(),
            name.to_string(),
            format!("{}@example.org", name.to_lowercase()),
            phone.to_string(),
            "F".to_string(),
            String::new(),
            "North".to_string(),
        ]
    }

    fn lookup_over(connector: FakeConnector) -> RosterLookup {
        RosterLookup::new(Arc::new(connector), 2, ColumnMap::default())
    }

    fn sources(ids: &[&str]) -> Vec<RosterSource> {
        ids.iter()
            .map(|id| RosterSource {
                sheet_id: id.to_string(),
                partition: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn finds_record_in_single_source() {
        let lookup = lookup_over(FakeConnector::with_sheets(vec![(
            "s1".to_string(),
            vec![row("919876543210", "Asha")],
        )]));
        let outcome = lookup
            .lookup(&PhoneNumber::normalize("919876543210"), &sources(&["s1"]))
            .await;
        match outcome {
            LookupOutcome::Found(record) => {
                assert_eq!(record.name, "Asha");
                assert_eq!(record.region, "North");
                assert_eq!(record.email, "asha@example.org");
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn suffix_match_covers_country_code_variance() {
        let lookup = lookup_over(FakeConnector::with_sheets(vec![(
            "s1".to_string(),
            vec![row("9876543210", "Asha")],
        )]));
        let outcome = lookup
            .lookup(&PhoneNumber::normalize("+919876543210"), &sources(&["s1"]))
            .await;
        assert!(matches!(outcome, LookupOutcome::Found(_)));
    }

    #[tokio::test]
    async fn first_source_wins_over_later_match() {
        let lookup = lookup_over(FakeConnector::with_sheets(vec![
            ("s1".to_string(), vec![row("919876543210", "First")]),
            ("s2".to_string(), vec![row("919876543210", "Second")]),
        ]));
        let outcome = lookup
            .lookup(
                &PhoneNumber::normalize("919876543210"),
                &sources(&["s1", "s2"]),
            )
            .await;
        match outcome {
            LookupOutcome::Found(record) => assert_eq!(record.name, "First"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_source_is_skipped_not_fatal() {
        let mut connector = FakeConnector::with_sheets(vec![(
            "good".to_string(),
            vec![row("919876543210", "Asha")],
        )]);
        connector.failing = vec!["bad".to_string()];
        let lookup = lookup_over(connector);
        let outcome = lookup
            .lookup(
                &PhoneNumber::normalize("919876543210"),
                &sources(&["bad", "good"]),
            )
            .await;
        assert!(matches!(outcome, LookupOutcome::Found(_)));
    }

    #[tokio::test]
    async fn all_sources_failing_is_unavailable_not_notfound() {
        let lookup = lookup_over(FakeConnector::all_failing());
        let outcome = lookup
            .lookup(
                &PhoneNumber::normalize("919876543210"),
                &sources(&["s1", "s2"]),
            )
            .await;
        assert_eq!(outcome, LookupOutcome::SourceUnavailable);
    }

    #[tokio::test]
    async fn readable_sources_without_match_is_notfound() {
        let lookup = lookup_over(FakeConnector::with_sheets(vec![(
            "s1".to_string(),
            vec![row("911111111111", "Other")],
        )]));
        let outcome = lookup
            .lookup(&PhoneNumber::normalize("919876543210"), &sources(&["s1"]))
            .await;
        assert_eq!(outcome, LookupOutcome::NotFound);
    }

    #[tokio::test]
    async fn retries_are_bounded_per_source() {
        let counting = Arc::new(FakeConnector::all_failing());
        let lookup = RosterLookup::new(counting.clone(), 2, ColumnMap::default());
        let outcome = lookup
            .lookup(&PhoneNumber::normalize("919876543210"), &sources(&["s1"]))
            .await;
        assert_eq!(outcome, LookupOutcome::SourceUnavailable);
        assert_eq!(counting.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn short_row_without_phone_cell_is_skipped() {
        let lookup = lookup_over(FakeConnector::with_sheets(vec![(
            "s1".to_string(),
            vec![
                vec!["only-one-cell".to_string()],
                row("919876543210", "Asha"),
            ],
        )]));
        let outcome = lookup
            .lookup(&PhoneNumber::normalize("919876543210"), &sources(&["s1"]))
            .await;
        assert!(matches!(outcome, LookupOutcome::Found(_)));
    }
}
