use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use employee_indexer::config::{Config, MissingIdPolicy};
use employee_indexer::constants;
use employee_indexer::domain::{CreateOutcome, DeleteOutcome, FacetBucket, IngestReport, SearchHit};
use employee_indexer::observability::{self, metrics};
use employee_indexer::{EmployeeAdmin, IndexerError};

#[derive(Parser)]
#[command(name = "employee_indexer")]
#[command(about = "Load employee CSV data into Elasticsearch and query it")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = constants::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Print Prometheus metrics before exiting
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a collection if it does not exist yet
    Create { collection: String },
    /// Index the employee CSV into a collection
    Index {
        collection: String,
        /// Column to drop from every document
        #[arg(long)]
        exclude: Option<String>,
        /// CSV file to read instead of the configured one
        #[arg(long)]
        source: Option<PathBuf>,
        /// Skip rows without an employee id instead of aborting
        #[arg(long)]
        skip_missing_ids: bool,
    },
    /// Match a value against one column
    Search {
        collection: String,
        column: String,
        value: String,
    },
    /// Count documents in a collection
    Count { collection: String },
    /// Delete one employee by id
    Delete { collection: String, id: String },
    /// Document counts per distinct value of a column
    Facet {
        collection: String,
        /// Column to facet on (defaults to the configured facet field)
        #[arg(long)]
        field: Option<String>,
    },
    /// Run the demo script end to end
    Demo {
        #[arg(long, default_value = constants::DEMO_NAME_COLLECTION)]
        name_collection: String,
        #[arg(long, default_value = constants::DEMO_PHONE_COLLECTION)]
        phone_collection: String,
    },
}

fn print_failure(action: &str, err: &IndexerError) {
    println!("❌ {} failed [{}]: {}", action, err.kind(), err);
}

fn print_created(collection: &str, outcome: CreateOutcome) {
    match outcome {
        CreateOutcome::Created => println!("✅ Collection '{}' created.", collection),
        CreateOutcome::AlreadyExists => println!("ℹ️  Collection '{}' already exists.", collection),
    }
}

fn print_report(report: &IngestReport) {
    println!("\n📊 Ingest Results for {}:", report.collection);
    println!("   Indexed: {}", report.indexed);
    println!("   Skipped: {}", report.skipped.len());
    println!("   Values coerced to zero: {}", report.coerced_to_zero);
    println!("   Excluded column: {}", report.excluded_column.as_deref().unwrap_or("<none>"));

    if !report.skipped.is_empty() {
        println!("\n⚠️  Skipped rows:");
        for row in &report.skipped {
            println!("   - line {}: {}", row.line, row.reason);
        }
    }
}

fn print_hits(collection: &str, column: &str, value: &str, hits: &[SearchHit]) {
    println!("\n🔎 {} where {} matches '{}': {} hit(s)", collection, column, value, hits.len());
    for hit in hits {
        let source = serde_json::to_string(&hit.source).unwrap_or_default();
        println!("   - {} (score {:.3}): {}", hit.id, hit.score.unwrap_or_default(), source);
    }
}

fn print_buckets(collection: &str, buckets: &[FacetBucket]) {
    println!("\n📂 Facets for {}:", collection);
    for bucket in buckets {
        println!("   {}: {}", bucket.key, bucket.doc_count);
    }
}

fn print_deleted(collection: &str, id: &str, outcome: &DeleteOutcome) {
    match outcome {
        DeleteOutcome::Deleted => println!("🗑️  Employee '{}' deleted from '{}'.", id, collection),
        other => println!("⚠️  Employee '{}' not deleted from '{}': {:?}", id, collection, other),
    }
}

async fn create(admin: &EmployeeAdmin, collection: &str) {
    match admin.create_collection(collection).await {
        Ok(outcome) => print_created(collection, outcome),
        Err(e) => print_failure("Create collection", &e),
    }
}

async fn count(admin: &EmployeeAdmin, collection: &str) {
    match admin.employee_count(collection).await {
        Ok(n) => println!("👥 Employee Count: {}", n),
        Err(e) => print_failure("Count", &e),
    }
}

async fn index(
    admin: &EmployeeAdmin,
    collection: &str,
    exclude: Option<&str>,
    source: Option<&Path>,
    policy: Option<MissingIdPolicy>,
) {
    match admin.index_data_from(collection, exclude, source, policy).await {
        Ok(report) => print_report(&report),
        Err(IndexerError::IngestAborted { indexed, source }) => {
            println!(
                "❌ Indexing into '{}' aborted after {} document(s) [{}]: {}",
                collection,
                indexed,
                source.kind(),
                source
            );
        }
        Err(e) => print_failure("Index", &e),
    }
}

async fn search(admin: &EmployeeAdmin, collection: &str, column: &str, value: &str) {
    match admin.search_by_column(collection, column, value).await {
        Ok(hits) => print_hits(collection, column, value, &hits),
        Err(e) => print_failure("Search", &e),
    }
}

async fn delete(admin: &EmployeeAdmin, collection: &str, id: &str) {
    match admin.delete_employee(collection, id).await {
        Ok(outcome) => print_deleted(collection, id, &outcome),
        Err(e) => print_failure("Delete", &e),
    }
}

async fn facet(admin: &EmployeeAdmin, collection: &str, field: Option<&str>) {
    match admin.facet(collection, field).await {
        Ok(buckets) => print_buckets(collection, &buckets),
        Err(e) => print_failure("Facet", &e),
    }
}

async fn run_demo(admin: &EmployeeAdmin, name_collection: &str, phone_collection: &str) {
    println!("🚀 Running demo script against {}...", admin.config().elasticsearch.url);

    create(admin, name_collection).await;
    create(admin, phone_collection).await;
    count(admin, name_collection).await;

    index(admin, name_collection, Some(constants::DEPARTMENT_COLUMN), None, None).await;
    index(admin, phone_collection, Some(constants::GENDER_COLUMN), None, None).await;

    delete(admin, name_collection, constants::DEMO_DELETE_EMPLOYEE_ID).await;
    count(admin, name_collection).await;

    search(admin, name_collection, constants::DEPARTMENT_COLUMN, "IT").await;
    search(admin, name_collection, constants::GENDER_COLUMN, "Male").await;
    search(admin, phone_collection, constants::DEPARTMENT_COLUMN, "IT").await;

    facet(admin, name_collection, None).await;
    facet(admin, phone_collection, None).await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = observability::init_logging(Path::new("logs"));

    let cli = Cli::parse();

    if let Err(e) = metrics::init() {
        warn!("Metrics disabled: {}", e);
    }

    // An explicit --config must exist; the default file is optional
    let config_path = (cli.config != Path::new(constants::DEFAULT_CONFIG_FILE)).then_some(cli.config.as_path());
    let config = Config::load(config_path)?;
    info!(url = %config.elasticsearch.url, "Configuration loaded");

    let admin = EmployeeAdmin::connect(config)?;

    match cli.command {
        Commands::Create { collection } => create(&admin, &collection).await,
        Commands::Index {
            collection,
            exclude,
            source,
            skip_missing_ids,
        } => {
            let policy = skip_missing_ids.then_some(MissingIdPolicy::Skip);
            index(&admin, &collection, exclude.as_deref(), source.as_deref(), policy).await;
        }
        Commands::Search { collection, column, value } => search(&admin, &collection, &column, &value).await,
        Commands::Count { collection } => count(&admin, &collection).await,
        Commands::Delete { collection, id } => delete(&admin, &collection, &id).await,
        Commands::Facet { collection, field } => facet(&admin, &collection, field.as_deref()).await,
        Commands::Demo {
            name_collection,
            phone_collection,
        } => run_demo(&admin, &name_collection, &phone_collection).await,
    }

    if cli.print_metrics {
        match metrics::render() {
            Some(text) => println!("\n{}", text),
            None => error!("Metrics recorder is not installed"),
        }
    }

    Ok(())
}
