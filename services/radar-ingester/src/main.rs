//! NEXRAD Level II radar ingester.
//!
//! Decodes the latest volume of one station, or a composite of many, from
//! the Level II chunks bucket (or a local mirror of it) and prints a JSON
//! summary per scan.

mod config;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ingestion::{build_composite, Composite, MetricsObserver, RadarIngester, ScanReport};
use level2_parser::{DecodeTarget, RadarProduct, TracingObserver};
use serde::Serialize;
use serde_json::json;
use storage::{CachedChunkRepository, ChunkRepository, ObjectStoreChunkRepository};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::RadarIngesterConfig;

#[derive(Parser, Debug)]
#[command(name = "radar-ingester")]
#[command(about = "Decode the latest NEXRAD Level II scans from the chunks bucket")]
struct Args {
    /// Station to decode, e.g. KTLX
    #[arg(short, long)]
    station: Option<String>,

    /// Product name or code (REF, VEL, SW, ZDR, RHO, PHI/KDP)
    #[arg(short, long)]
    product: Option<String>,

    /// Elevation number to decode
    #[arg(short, long)]
    tilt: Option<u8>,

    /// Build a multi-station composite instead of a single scan
    #[arg(long)]
    composite: bool,

    /// Comma-separated stations for the composite (default: all listed)
    #[arg(long, value_delimiter = ',')]
    stations: Vec<String>,

    /// Print the stations present in the store and exit
    #[arg(long)]
    list_stations: bool,

    /// Read chunks from a local mirror of the bucket
    #[arg(long, env = "NEXRAD_LOCAL_ROOT")]
    local_root: Option<PathBuf>,

    /// Write the full scan or composite as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file path (default: environment variables)
    #[arg(short, long, env = "RADAR_INGESTER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Serve Prometheus metrics on this port
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout is reserved for JSON summaries
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(port) = args.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus metrics exporter listening");
    }

    let mut config = match &args.config {
        Some(path) => RadarIngesterConfig::from_yaml(path)?,
        None => RadarIngesterConfig::from_env()?,
    };
    apply_overrides(&mut config, &args)?;
    let source = match &config.store.local_root {
        Some(root) => root.display().to_string(),
        None => config.store.bucket.clone(),
    };
    info!(
        source = %source,
        product = %config.product,
        tilt = config.tilt,
        "Loaded configuration"
    );

    let repository = build_repository(&config)?;

    if args.list_stations {
        let stations = repository.list_stations().await?;
        println!("{}", serde_json::to_string(&stations)?);
        return Ok(());
    }

    let ingester = Arc::new(
        RadarIngester::new(repository)
            .with_observer(Arc::new(MetricsObserver::new(TracingObserver))),
    );
    let target = config.target();

    if args.composite {
        let stations = (!args.stations.is_empty()).then(|| normalize_stations(&args.stations));
        let composite = build_composite(ingester, stations, target, &config.composite).await?;
        println!("{}", composite_summary(&composite));
        if let Some(path) = &args.output {
            write_json(path, &composite)?;
        }
        return Ok(());
    }

    let station = args
        .station
        .as_deref()
        .map(|s| s.trim().to_uppercase())
        .context("--station is required unless --composite or --list-stations is given")?;

    match ingester.latest_scan_report(&station, target).await {
        Some(report) => {
            println!("{}", scan_summary(&report));
            if let Some(path) = &args.output {
                write_json(path, &report.scan)?;
            }
        }
        None => {
            warn!(station = %station, "No scan decoded");
            println!("{}", no_scan_summary(&station, target));
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut RadarIngesterConfig, args: &Args) -> Result<()> {
    if let Some(root) = &args.local_root {
        config.store.local_root = Some(root.clone());
    }
    if let Some(product) = &args.product {
        config.product = product
            .parse::<RadarProduct>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(tilt) = args.tilt {
        config.tilt = tilt;
    }
    config.validate()
}

fn build_repository(config: &RadarIngesterConfig) -> Result<Arc<dyn ChunkRepository>> {
    let store: Arc<dyn ChunkRepository> = Arc::new(ObjectStoreChunkRepository::new(&config.store)?);
    if config.cache_capacity == 0 {
        return Ok(store);
    }
    Ok(Arc::new(CachedChunkRepository::new(store, config.cache_capacity)?))
}

fn normalize_stations(stations: &[String]) -> Vec<String> {
    let mut out: Vec<String> = stations
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    out.dedup();
    out
}

fn scan_summary(report: &ScanReport) -> serde_json::Value {
    let scan = &report.scan;
    let (min, max) = match scan.value_range() {
        Some((min, max)) => (Some(min), Some(max)),
        None => (None, None),
    };
    json!({
        "station": scan.station_id,
        "product": scan.product.code(),
        "units": scan.product.units(),
        "tilt": scan.tilt,
        "timestamp": scan.timestamp.to_rfc3339(),
        "volume": report.volume_number,
        "volume_complete": report.volume_complete,
        "radials": scan.radial_count,
        "gates": scan.gate_count(),
        "min": min,
        "max": max,
        "chunks": report.summary.chunks,
        "failed_blocks": report.summary.failed_blocks,
        "radials_skipped": report.summary.radials_skipped,
    })
}

fn no_scan_summary(station: &str, target: DecodeTarget) -> serde_json::Value {
    json!({
        "station": station,
        "product": target.product.code(),
        "tilt": target.tilt,
        "gates": 0,
    })
}

fn composite_summary(composite: &Composite) -> serde_json::Value {
    json!({
        "product": composite.product.code(),
        "tilt": composite.tilt,
        "generated_at": composite.generated_at.to_rfc3339(),
        "stations": composite.stations.len(),
        "missing": composite.missing,
        "gates": composite.gate_count(),
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer(std::io::BufWriter::new(file), value)?;
    info!(path = %path.display(), "Wrote JSON output");
    Ok(())
}
