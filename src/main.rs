use clap::Parser;
use melobot::cache::AudioFileCache;
use melobot::config::Settings;
use melobot::init_app_dirs;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the melobot cache administration tool
#[derive(Parser, Debug)]
#[command(author, version, about = "melobot audio cache admin", long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, env = "MELOBOT_CONFIG")]
    config: Option<String>,

    /// Cache directory (overrides the configured one)
    #[arg(long, env = "MELOBOT_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Run an eviction pass after scanning
    #[arg(long)]
    purge: bool,

    /// Delete the whole cache directory instead of evicting
    #[arg(long)]
    delete_all: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    init_app_dirs()?;

    // Load configuration from file or create default
    let config_path = match &args.config {
        Some(path) => Path::new(path).to_path_buf(),
        None => Settings::default_path(),
    };

    let mut settings = Settings::load(&config_path)?;

    // Override settings with command-line arguments (clap already folds in
    // the corresponding environment variables)
    if let Some(cache_dir) = args.cache_dir.clone() {
        settings.cache_dir = cache_dir;
    }

    settings.validate()?;

    let mut cache = AudioFileCache::new(&settings);

    if args.delete_all {
        if cache.delete_cache_dir() {
            println!("Cache directory removed.");
        } else {
            println!("Cache directory could not be fully removed; see logs.");
        }
        return Ok(());
    }

    cache.scan()?;
    println!(
        "Cache at {}: {} files, {} bytes",
        cache.cache_dir().display(),
        cache.file_count(),
        cache.size_bytes()
    );
    println!(
        "Limits: {} bytes, {} days (0 = unlimited)",
        settings.cache_limit_bytes, settings.cache_limit_days
    );
    println!("Retention map entries: {}", cache.retention_map().len());

    if args.purge {
        // No live bot means no current auto-playlist; treat every mapped
        // URL as still pinned so an admin purge cannot wipe the retention
        // entries a running bot relies on.
        let pinned: Vec<String> = cache.retention_map().values().cloned().collect();
        let summary = cache.evict(&pinned).await?;
        println!(
            "Eviction removed {} files ({} bytes), retained {}.",
            summary.removed_files, summary.removed_bytes, summary.retained_files
        );
        println!(
            "Cache now: {} files, {} bytes",
            cache.file_count(),
            cache.size_bytes()
        );
    }

    Ok(())
}
