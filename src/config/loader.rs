use anyhow::{Context, Result, bail};
use schemars::{Schema, schema_for};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use super::models::Config;

/// Load configuration from a string slice.
pub fn load_from_str(s: &str) -> Result<Config> {
    let cfg: Config =
        serde_json::from_str(s).context("Failed to parse JSON config string into Config")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<Config> {
    let cfg: Config =
        serde_json::from_reader(reader).context("Failed to parse JSON config from reader")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from a file path synchronously.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open config file {}", path_ref.display()))?;
    let cfg = load_from_reader(file)?;
    debug!(target: "autoclick::config", "Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Load configuration from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    let bytes = tokio::fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;
    let cfg: Config = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    validate_config(&cfg)?;
    debug!(target: "autoclick::config", "Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Generate the JSON Schema for the Config model.
pub fn generate_schema() -> Schema {
    schema_for!(Config)
}

/// Write the JSON Schema for the Config model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Sanity checks that serde cannot express:
/// - a configured cache budget is non-zero
/// - condition bitmaps have non-zero dimensions
/// - condition keys are unique within a scenario
/// - a bitmap file is declared with the same dimensions everywhere
/// - conditions have a `cache.storage_dir` to be read from
pub fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.cache.budget_kb == Some(0) {
        bail!("cache.budget_kb must be greater than zero");
    }

    let mut dimensions: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for (name, scenario) in &cfg.scenarios {
        let mut seen = BTreeSet::new();
        for (idx, cond) in scenario.conditions.iter().enumerate() {
            if cond.width == 0 || cond.height == 0 {
                bail!(
                    "Scenario '{}' condition {} ('{}') has empty dimensions {}x{}",
                    name,
                    idx,
                    cond.key,
                    cond.width,
                    cond.height
                );
            }
            if !seen.insert(cond.key.as_str()) {
                bail!(
                    "Scenario '{}' declares condition key '{}' more than once",
                    name,
                    cond.key
                );
            }
            let dims = (cond.width, cond.height);
            match dimensions.insert(cond.path.as_str(), dims) {
                Some(prev) if prev != dims => bail!(
                    "Scenario '{}' condition '{}' declares '{}' as {}x{}, elsewhere {}x{}",
                    name,
                    cond.key,
                    cond.path,
                    cond.width,
                    cond.height,
                    prev.0,
                    prev.1
                ),
                _ => {}
            }
        }
    }

    if !dimensions.is_empty() && cfg.cache.storage_dir.is_none() {
        bail!("Scenarios declare conditions but cache.storage_dir is not set");
    }

    Ok(())
}
