use clap::{Parser, Subcommand};
use gallery::album::{Gallery, LinkContext};
use gallery::search::{self, BulkSettings, DEFAULT_LIMIT, Indexer};
use gallery::{config, output, server};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "gallery")]
#[command(about = "Photo and video gallery server")]
#[command(long_about = "\
Photo and video gallery server

The album root is the data source. Directories become albums, files become
media, and optional JSON sidecars carry titles, keywords and sort order.

Album structure:

  albums/
  ├── index.meta.json              # Root album metadata (optional)
  ├── trip/                        # Album
  │   ├── index.meta.json          # {\"title\": \"Summer Trip\", \"sort\": \"-meta.createdate\"}
  │   ├── thumbnails/              # Generated thumbnails (hidden from listings)
  │   ├── photo1.jpg               # Image
  │   ├── photo1.meta.json         # Image metadata
  │   ├── clip.mp4                 # Video
  │   └── notes.pdf                # Other media
  └── empty/

Search is backed by Elasticsearch. 'gallery index' builds a fresh timestamped
index and swaps the alias over to it once every document is in.

Run 'gallery gen-config' to generate a documented gallery.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (missing file means stock defaults)
    #[arg(long, default_value = "gallery.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Rebuild the search index from an album root
    Index {
        /// Album root to index
        root: PathBuf,
        /// Search engine address
        #[arg(long)]
        address: Option<String>,
        /// Index alias name
        #[arg(long)]
        index_name: Option<String>,
        /// Documents per bulk request
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Query the search index
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Resolve an album or media path and print it as JSON
    Show {
        /// Path relative to the album root
        #[arg(default_value = "")]
        path: String,
    },
    /// Print a stock gallery.toml with all options documented
    GenConfig,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let load_config = || -> Result<config::GalleryConfig, config::ConfigError> {
        let config = config::load_config(&cli.config)?;
        init_tracing(&config.log_level);
        Ok(config)
    };

    match cli.command {
        Command::Serve => {
            server::serve(&load_config()?).await?;
        }
        Command::Index {
            root,
            address,
            index_name,
            chunk_size,
        } => {
            let mut config = load_config()?;
            config.source = root;
            if let Some(address) = address {
                config.search.address = address;
            }
            if let Some(index_name) = index_name {
                config.search.index = index_name;
            }
            if let Some(chunk_size) = chunk_size {
                config.search.chunk_size = chunk_size;
            }
            config.validate()?;
            if !config.source.is_dir() {
                return Err(format!("album root {} does not exist", config.source.display()).into());
            }

            let indexer = indexer_for(&config)?;
            let report = indexer.rebuild().await?;
            output::print_rebuild_report(&report, indexer.alias());
        }
        Command::Search { query, limit } => {
            let query = query.join(" ");
            let results = indexer_for(&load_config()?)?.search(&query, limit).await?;
            output::print_search_results(&query, &results);
        }
        Command::Show { path } => {
            let gallery = Gallery::from_config(&load_config()?);
            let resolved = gallery.resolve(&path, LinkContext::Gallery)?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn indexer_for(config: &config::GalleryConfig) -> Result<Indexer, search::SearchError> {
    let backend = search::backend_from_config(&config.search)?;
    Ok(Indexer::new(backend, &config.search.index, Gallery::from_config(config))
        .with_settings(BulkSettings::from_config(&config.search)))
}
