//! Radar ingester configuration.
//!
//! Loaded from a YAML file when `--config` is given, otherwise from
//! environment variables. YAML values may reference the environment with
//! `${VAR}` or `${VAR:-default}`.

use anyhow::{Context, Result};
use ingestion::CompositeOptions;
use level2_parser::{DecodeTarget, RadarProduct};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use storage::ChunkStoreConfig;

/// Top-level radar ingester configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarIngesterConfig {
    /// Where chunks are listed and fetched from
    pub store: ChunkStoreConfig,

    /// Chunks held in the in-memory cache; 0 disables caching
    pub cache_capacity: usize,

    /// Product decoded when none is given on the command line
    pub product: RadarProduct,

    /// Elevation number decoded when none is given on the command line
    pub tilt: u8,

    pub composite: CompositeOptions,
}

impl Default for RadarIngesterConfig {
    fn default() -> Self {
        Self {
            store: ChunkStoreConfig::default(),
            cache_capacity: 256,
            product: RadarProduct::BaseReflectivity,
            tilt: 0,
            composite: CompositeOptions::default(),
        }
    }
}

impl RadarIngesterConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: Self = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bucket) = lookup("NEXRAD_BUCKET") {
            config.store.bucket = bucket;
        }
        if let Some(region) = lookup("NEXRAD_REGION") {
            config.store.region = region;
        }
        config.store.endpoint = lookup("NEXRAD_ENDPOINT");
        config.store.local_root = lookup("NEXRAD_LOCAL_ROOT").map(PathBuf::from);
        if let Some(anonymous) = lookup("NEXRAD_ANONYMOUS") {
            config.store.anonymous = anonymous == "true";
        }
        if let Some(allow_http) = lookup("NEXRAD_ALLOW_HTTP") {
            config.store.allow_http = allow_http == "true";
        }
        if let Some(limit) = lookup("NEXRAD_LISTING_LIMIT") {
            config.store.listing_limit = Some(parse_var("NEXRAD_LISTING_LIMIT", &limit)?);
        }

        if let Some(capacity) = lookup("CHUNK_CACHE_CAPACITY") {
            config.cache_capacity = parse_var("CHUNK_CACHE_CAPACITY", &capacity)?;
        }
        if let Some(product) = lookup("RADAR_PRODUCT") {
            config.product = product
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid RADAR_PRODUCT")?;
        }
        if let Some(tilt) = lookup("RADAR_TILT") {
            config.tilt = parse_var("RADAR_TILT", &tilt)?;
        }

        if let Some(max) = lookup("COMPOSITE_MAX_STATIONS") {
            config.composite.max_stations = parse_var("COMPOSITE_MAX_STATIONS", &max)?;
        }
        if let Some(secs) = lookup("COMPOSITE_TIMEOUT_SECS") {
            config.composite.station_timeout_secs = parse_var("COMPOSITE_TIMEOUT_SECS", &secs)?;
        }
        if let Some(concurrency) = lookup("COMPOSITE_CONCURRENCY") {
            config.composite.concurrency = parse_var("COMPOSITE_CONCURRENCY", &concurrency)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.composite.concurrency == 0 {
            anyhow::bail!("composite.concurrency must be > 0");
        }
        if self.composite.max_stations == 0 {
            anyhow::bail!("composite.max_stations must be > 0");
        }
        if self.store.local_root.is_none() && self.store.bucket.is_empty() {
            anyhow::bail!("store.bucket must be set when no local_root is configured");
        }
        Ok(())
    }

    pub fn target(&self) -> DecodeTarget {
        DecodeTarget::new(self.product, self.tilt)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {}", name, value))
}

/// Expand `${VAR}` and `${VAR:-default}` references.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .with_context(|| format!("Unclosed variable substitution: ${{{}", after))?;
        result.push_str(&resolve_var_expr(&after[..end])?);
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((name, default)) = expr.split_once(":-") {
        match std::env::var(name.trim()) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}
