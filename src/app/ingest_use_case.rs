use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::app::ports::DocumentStorePort;
use crate::config::{MissingIdPolicy, NormalizeConfig};
use crate::domain::{CollectionName, IngestReport, SkippedRow};
use crate::error::{IndexerError, Result};
use crate::observability::metrics;
use crate::pipeline::csv_source::CsvSource;
use crate::pipeline::normalize::RecordNormalizer;

/// Loads the CSV, normalizes it and submits one document per row, in order.
pub struct IngestUseCase {
    store: Arc<dyn DocumentStorePort>,
    source: CsvSource,
    normalize: NormalizeConfig,
}

impl IngestUseCase {
    pub fn new(store: Arc<dyn DocumentStorePort>, source: CsvSource, normalize: NormalizeConfig) -> Self {
        Self { store, source, normalize }
    }

    pub fn with_missing_id_policy(mut self, policy: MissingIdPolicy) -> Self {
        self.normalize.missing_id = policy;
        self
    }

    /// Run one ingestion pass into `collection`, dropping `exclude_column`.
    ///
    /// Documents submitted before a failure stay in the store.
    pub async fn run(&self, collection: &CollectionName, exclude_column: Option<&str>) -> Result<IngestReport> {
        let started_at = Utc::now();
        let timer = Instant::now();

        let table = self.source.load()?;
        let normalizer = RecordNormalizer::new(self.normalize.cleaning_rules(exclude_column));
        let mut documents = normalizer.documents(&table);

        let mut indexed = 0usize;
        let mut skipped = Vec::new();

        for next in documents.by_ref() {
            let document = match next {
                Ok(document) => document,
                Err(IndexerError::MissingIdentifier { line, column })
                    if self.normalize.missing_id == MissingIdPolicy::Skip =>
                {
                    warn!(collection = %collection, line, column = %column, "Row has no identifier, skipping");
                    metrics::ingest::row_skipped(collection.as_str());
                    skipped.push(SkippedRow {
                        line,
                        reason: format!("missing '{}' column", column),
                    });
                    continue;
                }
                Err(err) => return Err(abort(collection, indexed, err)),
            };

            if let Err(err) = self
                .store
                .index_document(collection.as_str(), &document.id, &document.body)
                .await
            {
                return Err(abort(collection, indexed, err));
            }
            indexed += 1;
            metrics::ingest::document_indexed(collection.as_str());
        }

        let stats = documents.stats();
        metrics::ingest::values_coerced(stats.coerced_to_zero);
        metrics::ingest::run_duration(timer.elapsed().as_secs_f64());

        info!(
            indexed,
            skipped = skipped.len(),
            coerced = stats.coerced_to_zero,
            "Data indexed into collection '{}', excluding column '{}'.",
            collection,
            exclude_column.unwrap_or("<none>")
        );

        Ok(IngestReport {
            collection: collection.to_string(),
            columns: table.columns.clone(),
            excluded_column: exclude_column
                .filter(|c| table.has_column(c))
                .map(|c| c.to_string()),
            indexed,
            skipped,
            coerced_to_zero: stats.coerced_to_zero,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

fn abort(collection: &CollectionName, indexed: usize, err: IndexerError) -> IndexerError {
    error!(collection = %collection, indexed, kind = %err.kind(), "Ingestion aborted: {}", err);
    metrics::ingest::run_aborted(err.kind().as_str());
    IndexerError::IngestAborted {
        indexed,
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TextEncoding};
    use crate::domain::{DeleteOutcome, FacetBucket, SearchHit};
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    /// Accepts the first `accept` documents, then fails like an unreachable store.
    struct FlakyStore {
        accept: usize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentStorePort for FlakyStore {
        async fn collection_exists(&self, _collection: &str) -> Result<bool> {
            Ok(true)
        }
        async fn create_collection(&self, _collection: &str) -> Result<()> {
            Ok(())
        }
        async fn index_document(&self, _collection: &str, id: &str, _body: &Map<String, Value>) -> Result<()> {
            let mut seen = self.seen.lock().unwrap();
            if seen.len() >= self.accept {
                return Err(IndexerError::Connection("connection refused".to_string()));
            }
            seen.push(id.to_string());
            Ok(())
        }
        async fn search_match(&self, _c: &str, _f: &str, _v: &str) -> Result<Vec<SearchHit>> {
            Ok(vec![])
        }
        async fn count(&self, _collection: &str) -> Result<u64> {
            Ok(self.seen.lock().unwrap().len() as u64)
        }
        async fn delete_document(&self, _collection: &str, _id: &str) -> Result<DeleteOutcome> {
            Ok(DeleteOutcome::NotFound)
        }
        async fn terms_facet(&self, _c: &str, _f: &str, _s: u32) -> Result<Vec<FacetBucket>> {
            Ok(vec![])
        }
    }

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn use_case(store: Arc<FlakyStore>, file: &NamedTempFile) -> IngestUseCase {
        let config = Config::default();
        let source = CsvSource::new(file.path(), TextEncoding::Latin1, &config.source.na_values);
        IngestUseCase::new(store, source, config.normalize)
    }

    #[tokio::test]
    async fn submission_failure_aborts_and_keeps_partial_work() {
        let file = csv_file("Employee_ID,Gender\nE1,Male\nE2,Female\nE3,Male\n");
        let store = Arc::new(FlakyStore { accept: 2, seen: Mutex::new(vec![]) });

        let err = use_case(store.clone(), &file)
            .run(&CollectionName::new("Staff"), None)
            .await
            .unwrap_err();

        match err {
            IndexerError::IngestAborted { indexed, source } => {
                assert_eq!(indexed, 2);
                assert!(matches!(*source, IndexerError::Connection(_)));
            }
            other => panic!("expected IngestAborted, got {:?}", other),
        }
        assert_eq!(*store.seen.lock().unwrap(), vec!["E1".to_string(), "E2".to_string()]);
    }

    #[tokio::test]
    async fn missing_source_submits_nothing() {
        let store = Arc::new(FlakyStore { accept: 10, seen: Mutex::new(vec![]) });
        let config = Config::default();
        let source = CsvSource::new("no/such/employees.csv", TextEncoding::Latin1, &config.source.na_values);

        let err = IngestUseCase::new(store.clone(), source, config.normalize)
            .run(&CollectionName::new("staff"), Some("Department"))
            .await
            .unwrap_err();

        assert!(matches!(err, IndexerError::SourceMissing(_)));
        assert!(store.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn report_counts_coerced_values() {
        let file = csv_file("Employee_ID,Annual Salary,Bonus %\nE1,\"$90,000\",5%\nE2,unknown,%\n");
        let store = Arc::new(FlakyStore { accept: 10, seen: Mutex::new(vec![]) });

        let report = use_case(store, &file)
            .run(&CollectionName::new("staff"), Some("Department"))
            .await
            .unwrap();

        assert_eq!(report.indexed, 2);
        assert_eq!(report.coerced_to_zero, 2);
        assert_eq!(report.excluded_column, None);
        assert_eq!(report.collection, "staff");
    }
}
