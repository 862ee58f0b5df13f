use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{NaiveDate, TimeDelta};

use daily_wallpaper::archive::{Archive, walk_dir};
use daily_wallpaper::domain::{ImageName, Layout};
use daily_wallpaper::retention::trim;

fn fill(archive: &Archive, first: NaiveDate, count: i64) {
    for offset in 0..count {
        let date = first + TimeDelta::days(offset);
        let path = archive.path_for(&ImageName::new(date, "us"));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"jpg").unwrap();
    }
}

fn empty_dirs(root: &Utf8Path) -> Vec<Utf8PathBuf> {
    walk_dir(root)
        .unwrap()
        .into_iter()
        .filter(|path| path.is_dir())
        .filter(|path| fs::read_dir(path).unwrap().next().is_none())
        .collect()
}

#[test]
fn removes_oldest_beyond_bound() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let archive = Archive::new(root.clone(), Layout::DateTree);
    let first = NaiveDate::from_ymd_opt(2023, 11, 1).unwrap();
    fill(&archive, first, 100);

    let report = trim(&archive, 84).unwrap();
    assert_eq!(report.scanned, 100);
    assert_eq!(report.removed.len(), 16);

    let remaining = archive.list_images().unwrap();
    assert_eq!(remaining.len(), 84);
    assert_eq!(remaining[0].0.date(), first + TimeDelta::days(16));
    assert!(empty_dirs(&root).is_empty());
    // 17-30 November remain.
    assert!(root.join("2023/11").is_dir());
}

#[test]
fn empty_month_directories_are_pruned() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let archive = Archive::new(root.clone(), Layout::DateTree);
    fill(&archive, NaiveDate::from_ymd_opt(2023, 12, 30).unwrap(), 5);

    let report = trim(&archive, 3).unwrap();
    assert_eq!(report.removed.len(), 2);
    assert_eq!(report.removed_dirs, 2);
    assert!(!root.join("2023").exists());
    assert!(root.join("2024/01").is_dir());
    assert!(root.is_dir());
}

#[test]
fn trim_within_bound_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let archive = Archive::new(root, Layout::DeviceTree);
    fill(&archive, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), 10);
    fs::write(archive.root().join("notes.txt"), b"not an image").unwrap();

    let report = trim(&archive, 84).unwrap();
    assert_eq!(report.scanned, 10);
    assert!(report.removed.is_empty());
    assert!(archive.root().join("notes.txt").is_file());

    let again = trim(&archive, 84).unwrap();
    assert!(again.removed.is_empty());
}

#[test]
fn abandoned_temp_files_are_removed_before_pruning() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let archive = Archive::new(root.clone(), Layout::DateTree);
    fill(&archive, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(), 3);
    fs::create_dir_all(root.join("2024/03")).unwrap();
    fs::write(root.join("2024/03/.daily-wallpaperX1a2b3"), b"partial").unwrap();
    fs::write(root.join("2024/01/.daily-wallpaperY4c5d6"), b"partial").unwrap();

    let report = trim(&archive, 2).unwrap();
    assert_eq!(report.stale_temp_files.len(), 2);
    assert_eq!(report.scanned, 3);
    assert_eq!(report.removed.len(), 1);
    assert!(!root.join("2024/03").exists());
    assert!(!root.join("2024/01").exists());
    assert!(root.join("2024/02").is_dir());
    assert!(empty_dirs(&root).is_empty());
}
