use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::app::ingest_use_case::IngestUseCase;
use crate::app::ports::DocumentStorePort;
use crate::config::{Config, MissingIdPolicy};
use crate::domain::{CollectionName, CreateOutcome, DeleteOutcome, FacetBucket, IngestReport, SearchHit};
use crate::error::{IndexerError, Result};
use crate::infra::elasticsearch::ElasticsearchStore;
use crate::observability::metrics;
use crate::pipeline::csv_source::CsvSource;

/// The admin context: one store handle plus configuration, shared by every
/// operation for the life of the process.
pub struct EmployeeAdmin {
    store: Arc<dyn DocumentStorePort>,
    config: Config,
}

impl EmployeeAdmin {
    pub fn new(store: Arc<dyn DocumentStorePort>, config: Config) -> Self {
        Self { store, config }
    }

    /// Build the Elasticsearch client described by `config.elasticsearch`.
    pub fn connect(config: Config) -> Result<Self> {
        let store = ElasticsearchStore::new(&config.elasticsearch)?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn create_collection(&self, name: &str) -> Result<CreateOutcome> {
        let collection = CollectionName::new(name);
        let outcome = self.ensure_collection(&collection).await;

        match &outcome {
            Ok(CreateOutcome::Created) => info!("Collection '{}' created.", collection),
            Ok(CreateOutcome::AlreadyExists) => info!("Collection '{}' already exists.", collection),
            Err(err) => report("create_collection", &collection, err),
        }
        track("create_collection", outcome)
    }

    async fn ensure_collection(&self, collection: &CollectionName) -> Result<CreateOutcome> {
        if self.store.collection_exists(collection.as_str()).await? {
            return Ok(CreateOutcome::AlreadyExists);
        }
        self.store.create_collection(collection.as_str()).await?;
        Ok(CreateOutcome::Created)
    }

    /// Index the configured CSV into `name`, dropping `exclude_column`.
    pub async fn index_data(&self, name: &str, exclude_column: Option<&str>) -> Result<IngestReport> {
        self.index_data_from(name, exclude_column, None, None).await
    }

    /// Like [`index_data`](Self::index_data), optionally overriding the source
    /// file and the missing-identifier policy for this pass.
    pub async fn index_data_from(
        &self,
        name: &str,
        exclude_column: Option<&str>,
        source_path: Option<&Path>,
        missing_id: Option<MissingIdPolicy>,
    ) -> Result<IngestReport> {
        let collection = CollectionName::new(name);
        let mut source = CsvSource::from_config(&self.config.source);
        if let Some(path) = source_path {
            source = source.with_path(path);
        }

        let mut use_case = IngestUseCase::new(self.store.clone(), source, self.config.normalize.clone());
        if let Some(policy) = missing_id {
            use_case = use_case.with_missing_id_policy(policy);
        }

        let result = use_case.run(&collection, exclude_column).await;
        if let Err(err) = &result {
            // Aborted passes were already reported by the use case
            if !matches!(err, IndexerError::IngestAborted { .. }) {
                report("index_data", &collection, err);
            }
        }
        result
    }

    /// Full-text match of `value` against `column`. An empty vector means no
    /// document matched.
    pub async fn search_by_column(&self, name: &str, column: &str, value: &str) -> Result<Vec<SearchHit>> {
        let collection = CollectionName::new(name);
        let result = self.store.search_match(collection.as_str(), column, value).await;
        if let Err(err) = &result {
            report("search", &collection, err);
        }
        track("search", result)
    }

    pub async fn employee_count(&self, name: &str) -> Result<u64> {
        let collection = CollectionName::new(name);
        let result = self.store.count(collection.as_str()).await;
        if let Err(err) = &result {
            report("count", &collection, err);
        }
        track("count", result)
    }

    pub async fn delete_employee(&self, name: &str, employee_id: &str) -> Result<DeleteOutcome> {
        let collection = CollectionName::new(name);
        let result = self.store.delete_document(collection.as_str(), employee_id).await;
        match &result {
            Ok(DeleteOutcome::Deleted) => {
                info!("Employee '{}' deleted from collection '{}'.", employee_id, collection)
            }
            Ok(outcome) => warn!(?outcome, "Failed to delete employee '{}'.", employee_id),
            Err(err) => report("delete", &collection, err),
        }
        track("delete", result)
    }

    /// Document counts per distinct value of the facet field (default
    /// `Department`), using its exact-match sub-field.
    pub async fn department_facet(&self, name: &str) -> Result<Vec<FacetBucket>> {
        self.facet(name, None).await
    }

    pub async fn facet(&self, name: &str, field: Option<&str>) -> Result<Vec<FacetBucket>> {
        let collection = CollectionName::new(name);
        let facet_field = self.config.facet.keyword_field(field);
        let result = self
            .store
            .terms_facet(collection.as_str(), &facet_field, self.config.facet.size)
            .await;
        if let Err(err) = &result {
            report("facet", &collection, err);
        }
        track("facet", result)
    }
}

fn report(operation: &str, collection: &CollectionName, err: &IndexerError) {
    error!(operation, collection = %collection, kind = %err.kind(), "{}", err);
}

fn track<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    match &result {
        Ok(_) => metrics::store::request_success(operation),
        Err(err) => metrics::store::request_error(operation, err.kind().as_str()),
    }
    result
}
