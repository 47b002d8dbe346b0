//! Star catalog provider.
//!
//! Catalogs are built once from a CSV star list (`ra_deg, dec_deg, v_mag`,
//! optional header row) and persisted as an rkyv archive of the kd-tree for
//! fast reloads.

use std::path::Path;

use anyhow::{Context, Result};

use super::{Star, StarCatalog};

fn parse_field(record: &csv::StringRecord, index: usize, label: &str) -> Result<f64> {
    record
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("Missing {} field", label))?
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}", label))
}

/// Read stars from a CSV file of `ra_deg, dec_deg, v_mag` rows
pub fn load_star_csv<T: AsRef<Path>>(path: T) -> Result<Vec<Star>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path.as_ref())
        .with_context(|| format!("Failed to open star CSV file: {}", path.as_ref().display()))?;

    let mut stars = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read record {}", line + 1))?;
        // Skip a header row if present
        if line == 0 && record.get(0).is_some_and(|f| f.parse::<f64>().is_err()) {
            continue;
        }
        let ra_deg =
            parse_field(&record, 0, "ra_deg").with_context(|| format!("record {}", line + 1))?;
        let dec_deg =
            parse_field(&record, 1, "dec_deg").with_context(|| format!("record {}", line + 1))?;
        let v_mag =
            parse_field(&record, 2, "v_mag").with_context(|| format!("record {}", line + 1))?;
        stars.push(Star::from_ra_dec_deg(ra_deg, dec_deg, v_mag));
    }

    Ok(stars)
}

/// Load a catalog previously written with [`save_catalog`]
pub fn load_catalog<T: AsRef<Path>>(path: T) -> Result<StarCatalog> {
    let buffer = std::fs::read(path.as_ref())
        .with_context(|| format!("Failed to read star catalog {}", path.as_ref().display()))?;

    // Archived f64 fields need an aligned buffer
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(buffer.len());
    aligned.extend_from_slice(&buffer);

    let catalog = rkyv::from_bytes::<StarCatalog, rkyv::rancor::Error>(&aligned)
        .map_err(|e| anyhow::anyhow!("Failed to deserialize star catalog: {}", e))?;

    tracing::info!(
        "Loaded star catalog {} with {} stars",
        path.as_ref().display(),
        catalog.len()
    );
    Ok(catalog)
}

pub fn save_catalog<T: AsRef<Path>>(catalog: &StarCatalog, path: T) -> Result<()> {
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(catalog)
        .map_err(|e| anyhow::anyhow!("Failed to serialize star catalog: {}", e))?;
    std::fs::write(path.as_ref(), &bytes)
        .with_context(|| format!("Failed to write star catalog {}", path.as_ref().display()))?;
    tracing::debug!(
        "Serialized catalog with {} stars into {} bytes",
        catalog.len(),
        bytes.len()
    );
    Ok(())
}

/// Build a catalog from a CSV star list
pub fn catalog_from_csv<T: AsRef<Path>>(path: T) -> Result<StarCatalog> {
    Ok(StarCatalog::build(load_star_csv(path)?))
}
