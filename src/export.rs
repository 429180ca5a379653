use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;
use serde::Serialize;

use crate::geojson;
use crate::schema::{Category, Dataset};

// ------------------------------------------------------------
// Dataset export
// ------------------------------------------------------------
//
// Writes the dataset as one pretty-printed UTF-8 JSON document
// keyed by category. Missing parent directories are created.
//
// An export failure is fatal for the run: the collected data
// only exists in memory.
//
pub fn export_json(dataset: &Dataset, path: &Path) -> anyhow::Result<()> {
    write_pretty(dataset, path)?;
    info!("Data successfully exported to {}", path.display());
    Ok(())
}

// ------------------------------------------------------------
// GeoJSON export
// ------------------------------------------------------------
//
// One file per non-empty category inside `dir`:
// - `<category>.geojson` for feature collections
// - `overview.json` for the overview (no geometry)
//
// Returns the written paths in category order.
//
pub fn export_geojson(dataset: &Dataset, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for (category, document) in geojson::transform_all(dataset) {
        let extension = match category {
            Category::Overview => "json",
            _ => "geojson",
        };
        let path = dir.join(format!("{}.{}", category.key(), extension));
        write_pretty(&document, &path)?;
        written.push(path);
    }

    info!("Exported {} GeoJSON files to {}", written.len(), dir.display());
    Ok(written)
}

fn write_pretty<T: Serialize + ?Sized>(value: &T, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let data = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
