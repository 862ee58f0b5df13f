use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::archive::{Archive, subdirectories, walk_dir};
use crate::domain::{ImageName, Layout};
use crate::error::WallpaperError;

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub from: Option<Layout>,
    pub to: Layout,
    pub moved: usize,
    pub skipped: usize,
    pub sentinel_written: bool,
}

impl MigrationReport {
    fn unchanged(to: Layout) -> Self {
        Self {
            from: None,
            to,
            moved: 0,
            skipped: 0,
            sentinel_written: false,
        }
    }
}

fn is_year_dir(name: &str) -> bool {
    name.len() == 4 && name.chars().all(|ch| ch.is_ascii_digit())
}

fn is_month_dir(name: &str) -> bool {
    name.len() == 2
        && name.chars().all(|ch| ch.is_ascii_digit())
        && matches!(name.parse::<u32>(), Ok(1..=12))
}

fn is_day_dir(name: &str) -> bool {
    name.len() == 2
        && name.chars().all(|ch| ch.is_ascii_digit())
        && matches!(name.parse::<u32>(), Ok(1..=31))
}

fn shape(layout: Layout) -> (fn(&str) -> bool, fn(&str) -> bool) {
    match layout {
        Layout::DateTree => (is_year_dir, is_month_dir),
        Layout::DeviceTree => (is_month_dir, is_day_dir),
    }
}

// The first failed move aborts the migration. Source directories are only
// removed after every move succeeded.
pub fn convert_if_needed(
    archive: &Archive,
    regions: &[String],
) -> Result<MigrationReport, WallpaperError> {
    let active = archive.layout();
    let inactive = active.other();
    archive.ensure_root()?;

    let top_level = subdirectories(archive.root())?;
    if top_level.is_empty() {
        archive.write_sentinel()?;
        debug!(root = %archive.root(), "empty archive, nothing to convert");
        return Ok(MigrationReport {
            sentinel_written: true,
            ..MigrationReport::unchanged(active)
        });
    }

    let (is_outer, is_inner) = shape(inactive);
    let sources = top_level
        .into_iter()
        .filter(|name| is_outer(name))
        .map(|name| archive.root().join(name))
        .collect::<Vec<_>>();
    if sources.is_empty() {
        return Ok(MigrationReport::unchanged(active));
    }

    info!(from = %inactive, to = %active, dirs = sources.len(), "converting archive layout");
    let mut report = MigrationReport {
        from: Some(inactive),
        ..MigrationReport::unchanged(active)
    };

    for source in &sources {
        for inner in subdirectories(source)? {
            if !is_inner(&inner) {
                continue;
            }
            let leaf_dir = source.join(&inner);
            for file in leaf_files(&leaf_dir)? {
                let name = match ImageName::from_path(&file) {
                    Some(name) if regions.iter().any(|r| r == name.region()) => name,
                    _ => {
                        debug!(file = %file, "not an archive image, leaving in place");
                        report.skipped += 1;
                        continue;
                    }
                };
                let destination = archive.path_for(&name);
                move_file(&file, &destination).inspect_err(|err| {
                    error!(error = %err, "layout migration aborted");
                })?;
                report.moved += 1;
            }
        }
    }

    for source in &sources {
        remove_empty_tree(source);
    }
    info!(moved = report.moved, skipped = report.skipped, "archive layout converted");
    Ok(report)
}

fn leaf_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, WallpaperError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| WallpaperError::Filesystem(format!("read {dir}: {err}")))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| WallpaperError::Filesystem(err.to_string()))?;
        if !entry.path().is_file() {
            continue;
        }
        if let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn move_file(from: &Utf8Path, to: &Utf8Path) -> Result<(), WallpaperError> {
    let failure = |message: String| WallpaperError::LayoutMigration {
        from: from.to_string(),
        to: to.to_string(),
        message,
    };
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent.as_std_path()).map_err(|err| failure(err.to_string()))?;
    }
    fs::rename(from.as_std_path(), to.as_std_path()).map_err(|err| failure(err.to_string()))
}

fn remove_empty_tree(root: &Utf8Path) {
    let mut dirs = match walk_dir(root) {
        Ok(items) => items
            .into_iter()
            .filter(|path| path.as_std_path().is_dir())
            .collect::<Vec<_>>(),
        Err(_) => return,
    };
    dirs.sort_by_key(|path| std::cmp::Reverse(path.components().count()));
    for dir in dirs {
        let _ = fs::remove_dir(dir.as_std_path());
    }
    if fs::remove_dir(root.as_std_path()).is_err() {
        debug!(dir = %root, "source directory not empty, kept");
    }
}
