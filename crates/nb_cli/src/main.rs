use anyhow::Context;
use clap::Parser;
use nb_clustering::{ClusterBuilder, ClusterParams};
use nb_core::{
    ArticleCache, ArticleFilter, Clock, FetchParams, HumanDuration, PipelineConfig, StaticOutletTable, SystemClock,
};
use nb_sources::{
    handle_command, init_logging, FetchOrchestrator, FetchReport, GuardianAdapter, NewsApiAdapter, RssAdapter,
    RssFeed, SourceArgs, SourceRegistry,
};
use nb_storage::StorageKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Cross-outlet news aggregation with blind-spot detection", long_about = None)]
pub struct Cli {
    /// Cache backend: memory or sqlite
    #[arg(long, default_value = "memory")]
    storage: String,
    /// Database file for the sqlite backend
    #[arg(long)]
    db_path: Option<PathBuf>,
    #[arg(long, env = "NEWSAPI_KEY", hide_env_values = true)]
    newsapi_key: Option<String>,
    #[arg(long, env = "GUARDIAN_API_KEY", hide_env_values = true)]
    guardian_key: Option<String>,
    /// RSS feed as Name=url; repeat for more feeds
    #[arg(long = "rss-feed")]
    rss_feeds: Vec<RssFeed>,
    /// Per-source max-age override as tag=duration (e.g. newsapi=45m)
    #[arg(long = "max-age")]
    max_age: Vec<String>,
    /// Minimum similarity for two articles to share a cluster
    #[arg(long)]
    cluster_threshold: Option<f64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Refresh stale sources and print the merged articles
    Fetch {
        #[arg(long)]
        keywords: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Source tag to consult; repeat for more. Defaults to all.
        #[arg(long = "source")]
        sources: Vec<String>,
        /// Ignore freshness and refetch
        #[arg(long)]
        force: bool,
        /// Run in periodic mode with the specified interval (e.g. 1h, 30m, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// Search cached articles
    Search {
        term: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Cluster cached articles into stories and show their political spread
    Clusters {
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Number of newest articles to cluster
        #[arg(long, default_value_t = 200)]
        limit: usize,
        /// Only show single-perspective stories
        #[arg(long)]
        blindspots: bool,
        #[arg(long)]
        json: bool,
    },
    Sources(SourceArgs),
    /// Drop every cached article and fetch state
    Clear,
    /// Delete articles published longer ago than the given age
    Prune { older_than: HumanDuration },
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
}

fn build_registry(cli: &Cli) -> anyhow::Result<SourceRegistry> {
    let registry = SourceRegistry::new()
        .with(Arc::new(NewsApiAdapter::new(cli.newsapi_key.clone())?))
        .with(Arc::new(GuardianAdapter::new(cli.guardian_key.clone())?))
        .with(Arc::new(RssAdapter::new(cli.rss_feeds.clone())?));

    let available: Vec<&str> = registry.iter().filter(|a| a.is_available()).map(|a| a.tag()).collect();
    if available.is_empty() {
        warn!("No source is configured; set NEWSAPI_KEY, GUARDIAN_API_KEY or pass --rss-feed");
    } else {
        info!("🦗 Sources configured: {}", available.join(", "));
    }
    Ok(registry)
}

fn print_report(report: &FetchReport) {
    for (tag, message) in &report.errors {
        eprintln!("source {tag} failed: {message}");
    }
    if report.from_cache {
        println!("(all sources fresh, served from cache)");
    } else {
        println!(
            "fetched {} | saved {} | duplicates {} | rejected {}",
            report.fetched.join(", "),
            report.saved.saved_count,
            report.saved.duplicate_count,
            report.saved.error_count
        );
    }
    for article in &report.articles {
        println!(
            "{}  [{}] {} ({})",
            article.published_at.format("%Y-%m-%d %H:%M"),
            article.source_name,
            article.title,
            article.url
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("info");
    let cli = Cli::parse();

    let mut config = PipelineConfig::default();
    for entry in &cli.max_age {
        config.apply_override(entry)?;
    }
    if let Some(threshold) = cli.cluster_threshold {
        anyhow::ensure!((0.0..=1.0).contains(&threshold), "--cluster-threshold must be within 0..=1");
        config.cluster_threshold = threshold;
    }

    info!("💾 Opening {} cache...", cli.storage);
    let kind: StorageKind = cli.storage.parse()?;
    let cache = nb_storage::create_cache(kind, cli.db_path.as_deref())
        .await
        .with_context(|| format!("opening {} cache", cli.storage))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = build_registry(&cli)?;
    let clusters = ClusterBuilder::new(Arc::new(StaticOutletTable)).with_params(ClusterParams {
        threshold: config.cluster_threshold,
        ..Default::default()
    });
    let orchestrator = Arc::new(FetchOrchestrator::new(cache.clone(), registry, clock.clone(), config));

    match cli.command {
        Commands::Fetch {
            keywords,
            category,
            country,
            language,
            limit,
            sources,
            force,
            interval,
        } => {
            let params = FetchParams {
                keywords,
                category,
                country,
                language,
                limit,
                sources,
                force_refresh: force,
            };
            if let Some(interval) = interval {
                info!("Running in periodic mode with {}s interval", interval.0.as_secs());
                loop {
                    match orchestrator.get_articles(&params).await {
                        Ok(report) => print_report(&report),
                        Err(e) => error!("Fetch cycle failed: {}", e),
                    }
                    info!("Waiting {}s before next fetch", interval.0.as_secs());
                    clock.sleep(interval.0).await;
                }
            }
            let report = orchestrator.get_articles(&params).await?;
            print_report(&report);
        }
        Commands::Search {
            term,
            category,
            source,
            limit,
        } => {
            let filter = ArticleFilter {
                category,
                source_name: source,
                limit: Some(limit.unwrap_or(orchestrator.config().default_limit)),
                ..Default::default()
            };
            let articles = cache.search_articles(&term, &filter).await?;
            println!("{} result(s) for '{}'", articles.len(), term);
            for article in articles {
                println!("{}  [{}] {}", article.id, article.source_name, article.title);
            }
        }
        Commands::Clusters {
            keyword,
            category,
            limit,
            blindspots,
            json,
        } => {
            let filter = ArticleFilter {
                keyword,
                category,
                limit: Some(limit),
                ..Default::default()
            };
            let articles = cache.query(&filter).await?;
            let mut stories = clusters.build(&articles, clock.now());
            if blindspots {
                stories.retain(|c| c.is_blindspot);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&stories)?);
            } else {
                for story in &stories {
                    println!(
                        "{:.2}  {}{}",
                        story.relevance,
                        story.representative.title,
                        if story.is_blindspot { "  [BLINDSPOT]" } else { "" }
                    );
                    println!(
                        "      {} outlets ({}) | left {}% center {}% right {}%",
                        story.sources.len(),
                        story.sources.iter().cloned().collect::<Vec<_>>().join(", "),
                        story.bias.left,
                        story.bias.center,
                        story.bias.right
                    );
                }
                println!("{} stories from {} articles", stories.len(), articles.len());
            }
        }
        Commands::Sources(args) => handle_command(args, &orchestrator).await?,
        Commands::Clear => {
            cache.clear().await?;
            println!("cache cleared");
        }
        Commands::Prune { older_than } => {
            let age = chrono::Duration::from_std(older_than.0).context("prune age out of range")?;
            let removed = cache.prune_older_than(clock.now() - age).await?;
            println!("pruned {removed} article(s)");
        }
        Commands::Serve { addr } => {
            let state = nb_web::AppState::new(orchestrator, clusters, clock);
            nb_web::serve(state, addr).await?;
        }
    }

    Ok(())
}
