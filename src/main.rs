//! # lead-crawler CLI
//!
//! Command-line front end for the company-website crawler.
//!
//! - `crawl`: resolve a company's homepage, crawl its organizational pages and
//!   print the summarized report
//! - `resolve`: only determine the homepage for a company name
//! - `discover`: list the pages a crawl would fetch, without fetching them
//!
//! Secrets are read from the environment (`SERPER_API_KEY`, `GEMINI_API_KEY`,
//! `RENDER_SERVICE_URL`), optionally loaded from a `.env` file.

mod telemetry;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lead_crawler::crawler::{
    BaseDomain, CrawlQuery, Crawler, CrawlerConfig, HomepageResolver, SitemapDiscovery,
    filter_candidates,
};
use lead_crawler::http::{HttpClient, RequestPacer};
use lead_crawler::model::Client;
use lead_crawler::render::RenderService;
use lead_crawler::robots::RobotsCache;
use lead_crawler::search::SerperSearch;
use lead_crawler::summarize::AgentSummarizer;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Parser)]
#[command(author, version, about = "Crawl a company's website and summarize it for lead research", long_about = None)]
struct Cli {
    /// Directory for a log file in addition to stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl a company website and print the report
    Crawl(CrawlArgs),

    /// Resolve the homepage of a company
    Resolve(ResolveArgs),

    /// List the ranked pages selected for a crawl
    Discover(DiscoverArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
struct CrawlerOptions {
    /// Minimum interval between requests in milliseconds
    #[arg(short, long, default_value = "500")]
    rate_ms: u64,

    /// Concurrent page fetches
    #[arg(short, long, default_value = "4")]
    workers: usize,

    /// Maximum pages fetched, homepage included
    #[arg(short = 'p', long, default_value = "8")]
    max_pages: usize,

    /// Overall crawl deadline in seconds
    #[arg(long, default_value = "180")]
    deadline_secs: u64,

    /// Use homepage navigation links when no sitemap yields pages
    #[arg(long)]
    nav_fallback: bool,
}

impl CrawlerOptions {
    fn config(&self) -> CrawlerConfig {
        CrawlerConfig::builder()
            .rate_limit_ms(self.rate_ms)
            .max_workers(self.workers)
            .max_pages(self.max_pages)
            .crawl_deadline_ms(self.deadline_secs.saturating_mul(1000))
            .navigation_fallback(self.nav_fallback)
            .build()
    }
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Company name, optionally in the form "Name AND postal code"
    #[arg(required_unless_present = "url")]
    query: Option<String>,

    /// Postal code of the company
    #[arg(long)]
    postal_code: Option<String>,

    /// Crawl this website directly instead of searching for it
    #[arg(short, long)]
    url: Option<String>,

    /// Headless rendering service used for script-heavy pages
    #[arg(long, env = "RENDER_SERVICE_URL")]
    render_service: Option<String>,

    #[command(flatten)]
    options: CrawlerOptions,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// Company name
    #[arg(required = true)]
    company: String,
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    /// Company name, used when no URL is given
    #[arg(required_unless_present = "url")]
    company: Option<String>,

    /// Website to inspect directly
    #[arg(short, long)]
    url: Option<String>,

    #[command(flatten)]
    options: CrawlerOptions,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let _otel = telemetry::init_tracing_subscriber(cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Crawl(args) => crawl_command(args).await?,
        Commands::Resolve(args) => resolve_command(args).await?,
        Commands::Discover(args) => discover_command(args).await?,
    }

    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    query: &'a CrawlQuery,
    report: &'a lead_crawler::crawler::CrawlReport,
    text: String,
}

#[instrument]
async fn crawl_command(args: CrawlArgs) -> anyhow::Result<()> {
    let config = args.options.config();
    let http = HttpClient::new(&config)?;

    let search = SerperSearch::from_env(http.clone());
    let summarizer = AgentSummarizer::new(Client::new_gemini_from_env()?.into_completion());

    let mut builder = Crawler::builder(config).summarizer(Arc::new(summarizer));
    match search {
        Ok(search) => builder = builder.search(Arc::new(search)),
        Err(e) if args.url.is_some() => {
            info!("Search unavailable ({}), crawling the given URL", e);
            builder = builder.search(Arc::new(lead_crawler::search::StaticSearch::default()));
        }
        Err(e) => return Err(e.into()),
    }
    if let Some(endpoint) = &args.render_service {
        builder = builder.renderer(Arc::new(RenderService::new(http.clone(), endpoint)));
    }
    let crawler = builder.build()?;

    let mut query = args
        .query
        .as_deref()
        .map(CrawlQuery::parse)
        .unwrap_or_else(|| CrawlQuery::new(String::new(), None));
    if args.postal_code.is_some() {
        query.postal_code = args.postal_code.clone();
    }

    let report = match &args.url {
        Some(url) => {
            let base = BaseDomain::from_url(url).with_context(|| format!("invalid URL {}", url))?;
            Ok(crawler.crawl_domain(&base).await)
        }
        None => {
            crawler
                .crawl_report(&query.company_name, query.postal_code.as_deref())
                .await
        }
    };

    let rendered = match args.format {
        OutputFormat::Text => match &report {
            Ok(report) => report.render(),
            Err(_) => lead_crawler::crawler::NO_HOMEPAGE_MESSAGE.to_string(),
        },
        OutputFormat::Json => match &report {
            Ok(report) => serde_json::to_string_pretty(&JsonReport {
                query: &query,
                report,
                text: report.render(),
            })?,
            Err(e) => serde_json::to_string_pretty(&serde_json::json!({
                "query": query,
                "error": e.kind(),
                "text": lead_crawler::crawler::NO_HOMEPAGE_MESSAGE,
            }))?,
        },
    };

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, rendered).await?;
            println!("Saved report to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

#[instrument]
async fn resolve_command(args: ResolveArgs) -> anyhow::Result<()> {
    let config = CrawlerConfig::default();
    let http = HttpClient::new(&config)?;
    let resolver = HomepageResolver::new(Arc::new(SerperSearch::from_env(http)?));

    let base = resolver.resolve(&args.company).await?;
    println!("{}", base.homepage());
    Ok(())
}

#[instrument]
async fn discover_command(args: DiscoverArgs) -> anyhow::Result<()> {
    let config = args.options.config();
    let pacer = Arc::new(RequestPacer::new(config.rate_limit()));
    let http = HttpClient::new(&config)?.with_pacer(pacer.clone());

    let base = match (&args.url, &args.company) {
        (Some(url), _) => BaseDomain::from_url(url).with_context(|| format!("invalid URL {}", url))?,
        (None, Some(company)) => {
            let resolver = HomepageResolver::new(Arc::new(SerperSearch::from_env(http.clone())?));
            resolver.resolve(company).await?
        }
        (None, None) => return Err(anyhow!("either a company name or --url is required")),
    };

    let robots = Arc::new(RobotsCache::new(
        http.clone(),
        pacer.clone(),
        config.robots_user_agent.clone(),
    ));
    let discovery = SitemapDiscovery::new(
        http,
        pacer,
        robots,
        config.sitemap_max_depth,
        config.max_child_sitemaps,
    );

    let urls = discovery.discover_pages(&base).await;
    let candidates = filter_candidates(&base, &urls, config.max_pages);
    info!(discovered = urls.len(), selected = candidates.len(), "Discovery finished");

    match args.format {
        OutputFormat::Text => {
            for candidate in &candidates {
                println!(
                    "{:>4}  {:<10} {}",
                    candidate.priority,
                    format!("{:?}", candidate.category).to_lowercase(),
                    candidate.url
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&candidates)?),
    }
    Ok(())
}
