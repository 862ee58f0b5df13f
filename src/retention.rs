use std::fs;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::{Archive, remove_empty_dirs_upward};
use crate::error::WallpaperError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrimReport {
    pub scanned: usize,
    pub removed: Vec<String>,
    pub removed_dirs: usize,
    pub stale_temp_files: Vec<String>,
}

pub fn trim(archive: &Archive, max_images: usize) -> Result<TrimReport, WallpaperError> {
    let (stale, stale_dirs) = archive.remove_stale_temp_files()?;
    if !stale.is_empty() {
        info!(count = stale.len(), "removed stale temp files");
    }
    let images = archive.list_images()?;
    let mut report = TrimReport {
        scanned: images.len(),
        removed_dirs: stale_dirs,
        stale_temp_files: stale.into_iter().map(|path| path.to_string()).collect(),
        ..TrimReport::default()
    };
    if images.len() <= max_images {
        debug!(count = images.len(), max_images, "archive within retention bound");
        return Ok(report);
    }

    let excess = images.len() - max_images;
    for (name, path) in images.into_iter().take(excess) {
        if let Err(err) = fs::remove_file(path.as_std_path()) {
            warn!(file = %path, error = %err, "failed to remove archived image");
            continue;
        }
        debug!(image = %name, "removed");
        if let Some(parent) = path.parent() {
            report.removed_dirs += remove_empty_dirs_upward(parent, archive.root());
        }
        report.removed.push(path.to_string());
    }
    info!(
        removed = report.removed.len(),
        dirs = report.removed_dirs,
        max_images,
        "archive trimmed"
    );
    Ok(report)
}
