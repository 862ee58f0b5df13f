use std::collections::HashMap;
use std::fs;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::Archive;
use crate::domain::ImageName;
use crate::error::WallpaperError;
use crate::image_processing::ImageSaver;

pub const MANUAL_FILE_PREFIX: &str = "SCALE_";
pub const METADATA_FILE_NAME: &str = "IMAGES_METADATA.json";

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub ingested: Vec<String>,
    pub failed: Vec<String>,
}

pub fn ingest_manual_images(
    archive: &Archive,
    saver: &dyn ImageSaver,
) -> Result<IngestReport, WallpaperError> {
    let mut report = IngestReport::default();
    let sources = manual_sources(archive)?;
    if sources.is_empty() {
        return Ok(report);
    }
    let titles = read_titles(archive);

    for (source, name) in sources {
        let destination = archive.path_for(&name);
        let file_name = name.to_string();
        let title = titles.get(&file_name).map(String::as_str).unwrap_or("");
        let result = fs::read(source.as_std_path())
            .map_err(|err| WallpaperError::Filesystem(format!("read {source}: {err}")))
            .and_then(|bytes| saver.save(&bytes, &destination, title, ""))
            .and_then(|()| {
                fs::remove_file(source.as_std_path())
                    .map_err(|err| WallpaperError::Filesystem(format!("remove {source}: {err}")))
            });
        match result {
            Ok(()) => {
                debug!(source = %source, destination = %destination, "manual image ingested");
                report.ingested.push(destination.to_string());
            }
            Err(err) => {
                warn!(source = %source, error = %err, "manual image skipped");
                report.failed.push(source.to_string());
            }
        }
    }
    info!(
        ingested = report.ingested.len(),
        failed = report.failed.len(),
        "manual images processed"
    );
    Ok(report)
}

fn manual_sources(archive: &Archive) -> Result<Vec<(Utf8PathBuf, ImageName)>, WallpaperError> {
    let root = archive.root();
    if !root.as_std_path().is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(root.as_std_path())
        .map_err(|err| WallpaperError::Filesystem(format!("read {root}: {err}")))?;
    let mut sources = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| WallpaperError::Filesystem(err.to_string()))?;
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some(rest) = file_name.strip_prefix(MANUAL_FILE_PREFIX) else {
            continue;
        };
        if !entry.path().is_file() {
            continue;
        }
        match rest.parse::<ImageName>() {
            Ok(name) => sources.push((root.join(&file_name), name)),
            Err(err) => warn!(file = %file_name, error = %err, "unrecognized manual image name"),
        }
    }
    sources.sort();
    Ok(sources)
}

// A missing or unreadable file means no titles.
fn read_titles(archive: &Archive) -> HashMap<String, String> {
    let path = archive.root().join(METADATA_FILE_NAME);
    let Ok(content) = fs::read_to_string(path.as_std_path()) else {
        return HashMap::new();
    };
    serde_json::from_str(&content).unwrap_or_else(|err| {
        warn!(file = %path, error = %err, "ignoring malformed image metadata");
        HashMap::new()
    })
}
