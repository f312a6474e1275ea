use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use artist_registry::apis::everynoise::{self, GENRE_LIST_URL};
use artist_registry::apis::songkick::{self, SongkickClient, SongkickCredentials};
use artist_registry::apis::spotify::{self, SpotifyClient, SpotifyCredentials};
use artist_registry::config::Config;
use artist_registry::logging;
use artist_registry::metrics::{init_metrics, metrics_port_from_env};
use artist_registry::normalize::normalize;
use artist_registry::pipeline::{
    annotate_registry, build_registry, harvest_by_genre, link_tour_listings, load_notability, HarvestReport,
    LinkOptions, LinkReport,
};
use artist_registry::storage::{checkpoint_store, load_records, save_records};
use artist_registry::types::{ArtistRecord, Registry};

#[derive(Parser)]
#[command(name = "artist_registry")]
#[command(about = "Builds a deduplicated, cross-referenced artist registry")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical key for each name
    Normalize {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List the genres published by Every Noise at Once
    Genres,
    /// Harvest Spotify artists genre by genre
    Harvest {
        /// Genres to harvest (comma-separated). Defaults to the full genre list
        #[arg(long)]
        genres: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Keep one record per canonical name
    Dedupe {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Link registry records to Songkick
    Link {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Flag records found in the configured membership lists
    Annotate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Harvest, dedupe, link and annotate in one go
    Run {
        #[arg(long)]
        genres: Option<String>,
    },
}

fn parse_genre_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

async fn resolve_genres(genres: Option<String>) -> Result<Vec<String>> {
    match genres {
        Some(list) => Ok(parse_genre_list(&list)),
        None => {
            let client = reqwest::Client::new();
            Ok(everynoise::fetch_genres(&client, GENRE_LIST_URL).await?)
        }
    }
}

fn spotify_client(config: &Config) -> Result<SpotifyClient> {
    let path = config.credentials_path(spotify::CREDENTIALS_FILE);
    let credentials = SpotifyCredentials::load(&path).context("Spotify credentials are required")?;
    Ok(SpotifyClient::new(config.spotify.clone(), credentials)?)
}

fn songkick_client(config: &Config) -> Result<SongkickClient> {
    let path = config.credentials_path(songkick::CREDENTIALS_FILE);
    let credentials = SongkickCredentials::load(&path).context("Songkick credentials are required")?;
    Ok(SongkickClient::new(config.songkick.clone(), credentials)?)
}

fn failures_path(output: &Path) -> PathBuf {
    output.with_extension("failed.json")
}

fn print_harvest(report: &HarvestReport) {
    println!("\n📊 Harvest Results:");
    println!("   Artists: {}", report.records.len());
    println!("   Skipped (non-ASCII): {}", report.skipped_non_ascii);
    println!("   Skipped (already seen): {}", report.skipped_seen);
    println!("   Failed genres: {}", report.failed.len());
    if !report.failed.is_empty() {
        println!("\n⚠️  Failed genres:");
        for failure in &report.failed {
            println!("   - {}: {}", failure.genre, failure.reason);
        }
    }
}

fn print_link(report: &LinkReport) {
    println!("\n📊 Link Results:");
    println!("   Processed: {}", report.progress.processed);
    println!("   Matched: {}", report.progress.matched);
    println!("   Unmatched: {}", report.progress.unmatched);
    println!("   Failed: {}", report.progress.failed);
    println!("   Checkpoints: {}", report.checkpoints.len());
}

async fn harvest(config: &Config, genres: Option<String>) -> Result<HarvestReport> {
    let client = spotify_client(config)?;
    let genres = resolve_genres(genres).await?;
    info!("Harvesting {} genres", genres.len());
    Ok(harvest_by_genre(&client, &genres, &config.spotify).await)
}

async fn link(config: &Config, registry: &Registry) -> Result<LinkReport> {
    let client = songkick_client(config)?;
    let store = checkpoint_store(&config.checkpoint, &config.credentials_dir)?;
    let options = LinkOptions::from_config(config);
    let report = link_tour_listings(registry, &client, &options, store.as_deref()).await?;
    Ok(report)
}

fn save_link_failures(output: &Path, report: &LinkReport) -> Result<()> {
    if report.failed.is_empty() {
        return Ok(());
    }
    let path = failures_path(output);
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(&report.failed)?)?;
    warn!("{} lookups failed, see {}", report.failed.len(), path.display());
    Ok(())
}

fn save_registry(path: &Path, registry: Registry) -> Result<()> {
    let records: Vec<ArtistRecord> = registry.into_records();
    save_records(path, &records)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    if let Some(port) = metrics_port_from_env() {
        init_metrics(port);
    }

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Normalize { names } => {
            for name in names {
                println!("{}\t{}", name, normalize(&name));
            }
        }
        Commands::Genres => {
            let client = reqwest::Client::new();
            for genre in everynoise::fetch_genres(&client, GENRE_LIST_URL).await? {
                println!("{}", genre);
            }
        }
        Commands::Harvest { genres, out } => {
            println!("🔄 Harvesting Spotify artists...");
            let report = harvest(&config, genres).await?;
            print_harvest(&report);
            let out = out.unwrap_or_else(|| config.data_dir.join("spotify_artists.json"));
            save_records(&out, &report.records)?;
        }
        Commands::Dedupe { input, output } => {
            println!("🔨 Deduplicating {}...", input.display());
            let records = load_records(&input)?;
            let (registry, report) = build_registry(&records)?;
            println!("\n📊 Dedupe Results:");
            println!("   Input: {}", report.input);
            println!("   Kept: {}", report.kept);
            println!("   Dropped (no popularity): {}", report.dropped_inactive);
            println!("   Dropped (shared name): {}", report.dropped_ambiguous);
            save_registry(&output, registry)?;
        }
        Commands::Link { input, output } => {
            println!("🔗 Linking {} to Songkick...", input.display());
            let registry = Registry::from(load_records(&input)?);
            let report = link(&config, &registry).await?;
            print_link(&report);
            save_link_failures(&output, &report)?;
            save_registry(&output, report.registry)?;
        }
        Commands::Annotate { input, output } => {
            println!("🏷️  Annotating {}...", input.display());
            let registry = Registry::from(load_records(&input)?);
            let index = load_notability(&config.membership)?;
            save_registry(&output, annotate_registry(&registry, &index))?;
        }
        Commands::Run { genres } => {
            println!("🚀 Running full pipeline...");

            println!("\n📥 Step 1: Harvesting...");
            let harvested = harvest(&config, genres).await?;
            print_harvest(&harvested);
            save_records(&config.data_dir.join("spotify_artists.json"), &harvested.records)?;

            println!("\n🔨 Step 2: Deduplicating...");
            let (registry, report) = build_registry(&harvested.records)?;
            println!("   Kept {} of {} artists", report.kept, report.input);

            println!("\n🔗 Step 3: Linking to Songkick...");
            let linked = link(&config, &registry).await?;
            print_link(&linked);
            let output = config.data_dir.join("registry.json");
            save_link_failures(&output, &linked)?;

            println!("\n🏷️  Step 4: Annotating...");
            let index = load_notability(&config.membership)?;
            save_registry(&output, annotate_registry(&linked.registry, &index))?;
            println!("✅ Registry written to {}", output.display());
        }
    }
    Ok(())
}
