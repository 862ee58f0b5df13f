use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Datelike, NaiveDate};
use tempfile::Builder;
use tracing::debug;

use crate::domain::{DatedImage, ImageDownloadData, ImageName, Layout};
use crate::error::WallpaperError;

pub const SENTINEL_FILE_NAME: &str = "Please_do_not_modify_anything_in_this_directory";
pub const TEMP_FILE_PREFIX: &str = ".daily-wallpaper";

#[derive(Debug, Clone)]
pub struct Archive {
    root: Utf8PathBuf,
    layout: Layout,
}

impl Archive {
    pub fn new(root: Utf8PathBuf, layout: Layout) -> Self {
        Self { root, layout }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn ensure_root(&self) -> Result<(), WallpaperError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| WallpaperError::Filesystem(format!("create {}: {err}", self.root)))
    }

    pub fn dir_for(&self, date: NaiveDate) -> Utf8PathBuf {
        self.root.join(self.layout.relative_dir(date))
    }

    pub fn path_for(&self, name: &ImageName) -> Utf8PathBuf {
        self.dir_for(name.date()).join(name.to_string())
    }

    pub fn contains(&self, name: &ImageName) -> bool {
        self.path_for(name).as_std_path().exists()
    }

    pub fn plan_downloads(
        &self,
        candidates: Vec<DatedImage>,
        region: &str,
    ) -> (Vec<ImageDownloadData>, usize) {
        let mut planned: Vec<ImageDownloadData> = Vec::with_capacity(candidates.len());
        let mut skipped = 0;
        for candidate in candidates {
            let name = ImageName::new(candidate.date, region);
            let file_name = name.to_string();
            if self.contains(&name) || planned.iter().any(|p| p.target_file_name == file_name) {
                debug!(file = %file_name, "already archived");
                skipped += 1;
                continue;
            }
            planned.push(ImageDownloadData {
                date: candidate.date,
                title: candidate.title,
                copyright: candidate.copyright,
                candidate_urls: candidate.urls,
                target_directory: self.dir_for(candidate.date),
                target_file_name: file_name,
            });
        }
        (planned, skipped)
    }

    pub fn list_images(&self) -> Result<Vec<(ImageName, Utf8PathBuf)>, WallpaperError> {
        if !self.root.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let mut images = walk_dir(&self.root)?
            .into_iter()
            .filter(|path| path.as_std_path().is_file())
            .filter_map(|path| ImageName::from_path(&path).map(|name| (name, path)))
            .collect::<Vec<_>>();
        images.sort();
        Ok(images)
    }

    // Under the device tree this includes the same day of earlier years.
    pub fn todays_images(&self, today: NaiveDate) -> Result<Vec<Utf8PathBuf>, WallpaperError> {
        let dir = self.dir_for(today);
        if !dir.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| WallpaperError::Filesystem(format!("read {dir}: {err}")))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| WallpaperError::Filesystem(err.to_string()))?;
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if !path.as_std_path().is_file() {
                continue;
            }
            if let Some(name) = ImageName::from_path(&path) {
                let date = name.date();
                if date.month() == today.month() && date.day() == today.day() {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn todays_wallpaper(&self, today: NaiveDate, region: &str) -> Option<Utf8PathBuf> {
        let path = self.path_for(&ImageName::new(today, region));
        path.as_std_path().is_file().then_some(path)
    }

    // Leftovers of writes abandoned at a download deadline.
    pub fn remove_stale_temp_files(&self) -> Result<(Vec<Utf8PathBuf>, usize), WallpaperError> {
        if !self.root.as_std_path().is_dir() {
            return Ok((Vec::new(), 0));
        }
        let stale = walk_dir(&self.root)?
            .into_iter()
            .filter(|path| path.as_std_path().is_file())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.starts_with(TEMP_FILE_PREFIX))
            })
            .collect::<Vec<_>>();
        let mut removed = Vec::with_capacity(stale.len());
        let mut removed_dirs = 0;
        for path in stale {
            fs::remove_file(path.as_std_path())
                .map_err(|err| WallpaperError::Filesystem(format!("remove {path}: {err}")))?;
            debug!(file = %path, "removed stale temp file");
            if let Some(parent) = path.parent() {
                removed_dirs += remove_empty_dirs_upward(parent, &self.root);
            }
            removed.push(path);
        }
        Ok((removed, removed_dirs))
    }

    pub fn write_sentinel(&self) -> Result<(), WallpaperError> {
        let path = self.root.join(SENTINEL_FILE_NAME);
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_std_path())
            .map(|_| ())
            .map_err(|err| WallpaperError::Filesystem(format!("create {path}: {err}")))
    }
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), WallpaperError> {
    let parent = path
        .parent()
        .ok_or_else(|| WallpaperError::Filesystem(format!("invalid destination path {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| WallpaperError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile_in(parent.as_std_path())
        .map_err(|err| WallpaperError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| WallpaperError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| WallpaperError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn walk_dir(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, WallpaperError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(path.as_std_path())
            .map_err(|err| WallpaperError::Filesystem(format!("read {path}: {err}")))?;
        for entry in entries {
            let entry = entry.map_err(|err| WallpaperError::Filesystem(err.to_string()))?;
            let path = Utf8PathBuf::from_path_buf(entry.path()).map_err(|path| {
                WallpaperError::Filesystem(format!("non-utf8 path {}", path.display()))
            })?;
            if path.as_std_path().is_dir() {
                stack.push(path.clone());
            }
            items.push(path);
        }
    }
    Ok(items)
}

// Never removes `stop` or anything above it.
pub fn remove_empty_dirs_upward(start: &Utf8Path, stop: &Utf8Path) -> usize {
    let mut removed = 0;
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        if fs::remove_dir(dir.as_std_path()).is_err() {
            break;
        }
        removed += 1;
        current = dir.parent();
    }
    removed
}

pub fn subdirectories(root: &Utf8Path) -> Result<Vec<String>, WallpaperError> {
    let entries = fs::read_dir(root.as_std_path())
        .map_err(|err| WallpaperError::Filesystem(format!("read {root}: {err}")))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| WallpaperError::Filesystem(err.to_string()))?;
        if entry.path().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
