//! Ringmap Viewer: headless driver for the ring overlay.
//!
//! `import` seeds the persistent cache from a GeoJSON file, `run` boots a
//! headless map surface and runs the overlay sync protocol against it, and
//! `style` prints the overlay style payload.

mod commands;
mod config;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use config::{ViewerConfig, DEFAULT_CACHE_DIR};
use error::CliError;

#[derive(Parser)]
#[command(name = "ringmap-viewer")]
#[command(about = "Render cached ring features over a map surface", long_about = None)]
struct Args {
    /// Map access token (falls back to RINGMAP_ACCESS_TOKEN, then MAPBOX_TOKEN)
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// Directory of the persistent feature cache
    #[arg(long, global = true, default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a GeoJSON FeatureCollection as the cached feature set
    Import {
        /// Path to a .geojson file
        file: PathBuf,
    },
    /// Boot a headless surface, hydrate it from the cache and report
    Run {
        /// Zoom level to evaluate paint at
        #[arg(long, default_value_t = 2.0)]
        zoom: f64,
    },
    /// Print the overlay style payload as JSON
    Style,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ViewerConfig::resolve(args.access_token, args.cache_dir);

    if let Err(e) = dispatch(&config, args.command).await {
        e.exit();
    }
}

async fn dispatch(config: &ViewerConfig, command: Command) -> Result<(), CliError> {
    match command {
        Command::Import { file } => {
            let collection = commands::import(config, &file).await?;
            println!(
                "Imported {} features (rings {:?}) into {}",
                collection.len(),
                collection.rings(),
                config.cache_dir.display()
            );
        }
        Command::Run { zoom } => {
            let report = commands::run(config, zoom).await?;
            info!("Session complete");

            println!("Layer stack (bottom to top):");
            for layer in &report.layers {
                match report.drawn.iter().find(|(id, _)| id == layer) {
                    Some((_, count)) => println!("  {layer}  [{count} drawn at z{zoom}]"),
                    None => println!("  {layer}"),
                }
            }
            println!();
            println!(
                "Overlay source: {} features, rings {:?}",
                report.features, report.rings
            );
        }
        Command::Style => println!("{}", commands::style()?),
    }
    Ok(())
}
