//! # File I/O Module
//!
//! JSON input and output for the pipeline:
//!
//! | File             | Type                 | Direction |
//! |------------------|----------------------|-----------|
//! | coupon           | [`Coupon`]           | load      |
//! | settings         | [`AnalysisSettings`] | load      |
//! | factor tables    | [`FactorTables`]     | load      |
//! | analysis report  | [`AnalysisReport`]   | save/load |
//!
//! Saves are atomic: the JSON is written to a `.tmp` sibling, synced and
//! renamed over the target, so an interrupted save never leaves a partial
//! report behind.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kt_core::file_io::{load_coupon, load_settings};
//! use std::path::Path;
//!
//! let coupon = load_coupon(Path::new("coupon.json"))?;
//! let settings = load_settings(Some(Path::new("settings.json")))?;
//! # Ok::<(), kt_core::errors::KtError>(())
//! ```

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::coupon::Coupon;
use crate::errors::{KtError, KtResult};
use crate::factors::FactorTables;
use crate::pipeline::{AnalysisReport, SCHEMA_VERSION};
use crate::settings::AnalysisSettings;

/// Read and parse a JSON file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> KtResult<T> {
    let mut file =
        File::open(path).map_err(|e| KtError::file_error("open", path.display().to_string(), e.to_string()))?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| KtError::file_error("read", path.display().to_string(), e.to_string()))?;

    serde_json::from_str(&contents).map_err(|e| KtError::SerializationError {
        reason: format!("Invalid JSON in {}: {}", path.display(), e),
    })
}

/// Write `value` as pretty JSON with atomic write semantics.
///
/// 1. Serialize to JSON
/// 2. Write to `<path>.tmp`
/// 3. Sync to disk
/// 4. Rename over `path`
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> KtResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| KtError::SerializationError {
        reason: e.to_string(),
    })?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    let mut tmp_file = File::create(tmp_path)
        .map_err(|e| KtError::file_error("create temp file", tmp_path.display().to_string(), e.to_string()))?;

    tmp_file
        .write_all(json.as_bytes())
        .map_err(|e| KtError::file_error("write temp file", tmp_path.display().to_string(), e.to_string()))?;

    tmp_file
        .sync_all()
        .map_err(|e| KtError::file_error("sync temp file", tmp_path.display().to_string(), e.to_string()))?;

    fs::rename(tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(tmp_path);
        KtError::file_error("rename to final", path.display().to_string(), e.to_string())
    })?;

    debug!("saved {}", path.display());
    Ok(())
}

/// Load and validate a coupon.
pub fn load_coupon(path: &Path) -> KtResult<Coupon> {
    let coupon: Coupon = load_json(path)?;
    coupon.validate()?;
    Ok(coupon)
}

/// Load settings, or the defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> KtResult<AnalysisSettings> {
    let settings = match path {
        Some(path) => load_json(path)?,
        None => AnalysisSettings::default(),
    };
    settings.validate()?;
    Ok(settings)
}

pub fn load_factor_tables(path: &Path) -> KtResult<FactorTables> {
    load_json(path)
}

pub fn save_report(report: &AnalysisReport, path: &Path) -> KtResult<()> {
    save_json(report, path)
}

/// Load a saved report, rejecting incompatible versions.
pub fn load_report(path: &Path) -> KtResult<AnalysisReport> {
    let report: AnalysisReport = load_json(path)?;
    validate_version(&report.version)?;
    Ok(report)
}

/// A file version is compatible when its major version matches and, while
/// on 0.x, its minor version is not newer than ours.
fn validate_version(file_version: &str) -> KtResult<()> {
    let mismatch = || {
        KtError::invalid_input(
            "version",
            file_version,
            format!("Incompatible report version, expected {}", SCHEMA_VERSION),
        )
    };

    let file_parts: Vec<u32> = file_version.split('.').filter_map(|p| p.parse().ok()).collect();
    let current_parts: Vec<u32> = SCHEMA_VERSION.split('.').filter_map(|p| p.parse().ok()).collect();

    if file_parts.is_empty() || current_parts.is_empty() || file_parts[0] != current_parts[0] {
        return Err(mismatch());
    }
    if current_parts[0] == 0 && file_parts.len() > 1 && current_parts.len() > 1 && file_parts[1] > current_parts[1] {
        return Err(mismatch());
    }
    Ok(())
}
