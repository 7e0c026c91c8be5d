//! Serves a paginated collection over HTTP until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use folio_core::Document;
use folio_server::config::DemoArgs;
use folio_server::logging::init_tracing;
use folio_server::network::NetworkModule;
use folio_server::seed::{load_documents, load_schema, sample_documents, sample_schema};
use folio_server::{DataSourceAdapter, MemorySource, PaginatedQueryExecutor, TimeoutSource};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = DemoArgs::parse();
    init_tracing(args.log_format, "info")?;
    let config = args.server_config();

    let (schema, documents) = match (&args.schema, &args.seed) {
        (Some(schema_path), Some(seed_path)) => {
            let schema = load_schema(schema_path)?;
            let documents = load_documents(seed_path, &schema)?;
            (schema, documents)
        }
        (None, Some(seed_path)) => {
            let schema = sample_schema()?;
            let documents = load_documents(seed_path, &schema)?;
            (schema, documents)
        }
        _ => {
            let schema = sample_schema()?;
            let documents = sample_documents(&schema)?;
            (schema, documents)
        }
    };
    let schema = Arc::new(schema);

    let memory = MemorySource::<Document>::for_schema(&schema);
    let loaded = documents.len();
    memory.extend(documents).context("seeding the in-memory source")?;
    info!(documents = loaded, tie_break = %schema.tie_break().field, "collection loaded");

    let source: Arc<dyn DataSourceAdapter<Document>> =
        Arc::new(TimeoutSource::new(memory, config.source_timeout));
    let executor = Arc::new(PaginatedQueryExecutor::new(schema, config.query));

    let mut network = NetworkModule::new(config.network, executor, source);
    let port = network.start().await?;
    info!(port, "folio demo ready at /items");

    network
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}
