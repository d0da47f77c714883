//! YAML persistence for schemas and inference settings.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub fn from_str<T: DeserializeOwned>(raw: &str) -> Result<T> {
    // An empty document means "all defaults", not a parse error.
    if raw.trim().is_empty() {
        return Ok(serde_yaml::from_str("{}")?);
    }
    Ok(serde_yaml::from_str(raw)?)
}

pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut raw = String::new();
    File::open(path)
        .and_then(|file| BufReader::new(file).read_to_string(&mut raw))
        .with_context(|| format!("Reading YAML file {path:?}"))?;
    from_str(&raw).with_context(|| format!("Parsing YAML file {path:?}"))
}

pub fn save_to_path<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating YAML file {path:?}"))?;
    let mut writer = BufWriter::new(file);
    serde_yaml::to_writer(&mut writer, data)
        .with_context(|| format!("Serializing YAML file {path:?}"))?;
    writer
        .flush()
        .with_context(|| format!("Writing YAML file {path:?}"))
}

pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}
