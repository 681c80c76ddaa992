//! Walk the applications, indices, data sources and documents visible to
//! the ambient AWS credentials.
//!
//! Run with: cargo run --example info -- [application-id] [DATA_SOURCE_TYPE]

use anyhow::Context;
use futures::{TryStreamExt, pin_mut};
use qbapi_tools::qbusiness::{DataSourceType, QBusinessClient, ServiceIdentity};
use qbapi_tools::setup_tracing;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let level = std::env::var("logging").unwrap_or_else(|_| "debug".to_string());
    setup_tracing(&level, None)?;

    let region = std::env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    let mut args = std::env::args().skip(1);
    let app_id = args.next();
    let ds_type = args
        .next()
        .map(|t| t.parse::<DataSourceType>())
        .transpose()
        .context("unknown data source type")?;

    let client = QBusinessClient::connect(ServiceIdentity::Ambient, &region, None).await?;

    info!(region = %region, "Applications");
    let apps: Vec<_> = client.applications().try_collect().await?;
    for app in &apps {
        debug!("{app:#?}");
    }

    let Some(app_id) = app_id else {
        return Ok(());
    };

    info!(app = %app_id, "Data sources by index");
    let indices = client.indices(&app_id);
    pin_mut!(indices);
    while let Some(index) = indices.try_next().await? {
        let sources: Vec<_> = client
            .data_sources(&app_id, &index.index_id)
            .try_collect()
            .await?;
        let ids: Vec<&str> = sources
            .iter()
            .filter(|ds| ds_type.is_none() || ds.source_type() == ds_type)
            .map(|ds| ds.data_source_id.as_str())
            .collect();
        debug!(index = %index.index_id, data_sources = ?ids);
    }

    info!(app = %app_id, filter = ?ds_type, "Indexed documents");
    let documents = client.documents_by_datasource_type(&app_id, ds_type);
    pin_mut!(documents);
    while let Some(doc) = documents.try_next().await? {
        debug!("{doc:#?}");
    }

    Ok(())
}
