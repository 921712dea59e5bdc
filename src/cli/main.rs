use anyhow::Context;
use clap::{Parser, Subcommand};
use dp_search_api::{
    config::Config,
    elasticsearch::{new_index_name, signer, ElasticSearch, HttpEsClient, INDEX_SETTINGS},
    health::{self, HealthStatus},
    reindex::{flip_alias, DatasetApiClient, Reindexer, ZebedeeClient},
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dp-search-reindex")]
#[command(about = "Maintenance commands for the search index", long_about = None)]
struct Cli {
    /// Elasticsearch URL, overriding configuration
    #[arg(short, long, env = "DP_SEARCH__ELASTICSEARCH__URL")]
    elasticsearch: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from the CMS and the datasets catalogue
    Reindex {
        /// Skip the datasets catalogue
        #[arg(long)]
        no_datasets: bool,
    },

    /// Create an empty index with the search settings
    CreateIndex,

    /// Point the alias at an index and drop the others
    FlipAlias {
        #[arg(value_name = "INDEX")]
        index: String,
    },

    /// Check cluster health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = cli.elasticsearch {
        config.elasticsearch.url = url;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dp_search_api={}", config.observability.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let request_signer = signer::from_config(&config.elasticsearch.signer).await?;
    let es: Arc<dyn ElasticSearch> = Arc::new(HttpEsClient::new(
        config.elasticsearch.url.clone(),
        Duration::from_secs(config.server.request_timeout_secs),
        request_signer,
    )?);

    match cli.command {
        Commands::Reindex { no_datasets } => {
            let cms = Arc::new(ZebedeeClient::from_config(&config.upstream)?);
            let mut reindexer = Reindexer::new(
                es,
                cms,
                config.reindex.clone(),
                config.elasticsearch.bulk.clone(),
            );
            if config.reindex.include_datasets && !no_datasets {
                reindexer =
                    reindexer.with_datasets(Arc::new(DatasetApiClient::from_config(&config.upstream)?));
            }

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, stopping reindex");
                    on_signal.cancel();
                }
            });

            let summary = reindexer.run(cancel).await?;
            println!("{}", summary);
            println!("Alias now points at {}", summary.index);
        }

        Commands::CreateIndex => {
            let name = new_index_name();
            es.create_index(&name, INDEX_SETTINGS.as_bytes()).await?;
            println!("{}", name);
        }

        Commands::FlipAlias { index } => {
            let deleted = flip_alias(es.as_ref(), &index).await?;
            println!("Alias now points at {}", index);
            for name in deleted {
                println!("Deleted {}", name);
            }
        }

        Commands::Health => match health::probe(es.as_ref()).await {
            HealthStatus::Ok => println!("OK"),
            HealthStatus::Error { error } => anyhow::bail!("cluster unhealthy: {}", error),
        },
    }

    Ok(())
}
