use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;

use daily_wallpaper::archive::write_bytes_atomic;
use daily_wallpaper::config::DownloadSettings;
use daily_wallpaper::domain::{ImageDownloadData, ImageName};
use daily_wallpaper::download::DownloadCoordinator;
use daily_wallpaper::error::WallpaperError;
use daily_wallpaper::http::HttpTransport;
use daily_wallpaper::image_processing::ImageSaver;

enum Reply {
    Body(&'static [u8]),
    Fail,
    Slow(Duration),
}

#[derive(Default)]
struct ScriptedTransport {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn with(mut self, url: &str, reply: Reply) -> Self {
        self.replies.insert(url.to_string(), reply);
        self
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, url: &str, _query: &[(&str, &str)]) -> Result<Vec<u8>, WallpaperError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.replies.get(url) {
            Some(Reply::Body(bytes)) => Ok(bytes.to_vec()),
            Some(Reply::Slow(delay)) => {
                thread::sleep(*delay);
                Ok(b"late".to_vec())
            }
            Some(Reply::Fail) | None => Err(WallpaperError::RemoteService(format!("{url}: refused"))),
        }
    }
}

/// Writes the raw bytes; refuses anything that is not an image.
struct RawSaver;

impl ImageSaver for RawSaver {
    fn save(
        &self,
        bytes: &[u8],
        destination: &Utf8Path,
        _title: &str,
        _copyright: &str,
    ) -> Result<(), WallpaperError> {
        if bytes == b"corrupt" {
            return Err(WallpaperError::ImageSave {
                path: destination.to_string(),
                message: "not a jpeg".to_string(),
            });
        }
        write_bytes_atomic(destination, bytes)
    }
}

fn settings(batch_timeout: Duration) -> DownloadSettings {
    DownloadSettings {
        request_timeout: Duration::from_secs(1),
        batch_timeout,
        attempts: 3,
        workers: 4,
    }
}

fn job(root: &Utf8Path, day: u32, urls: &[&str]) -> ImageDownloadData {
    let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
    ImageDownloadData {
        date,
        title: format!("Day {day}"),
        copyright: String::new(),
        candidate_urls: urls.iter().map(|u| u.to_string()).collect(),
        target_directory: root.join("2024/03"),
        target_file_name: ImageName::new(date, "us").to_string(),
    }
}

fn root(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
}

#[test]
fn failing_item_leaves_no_file_and_others_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let root = root(&dir);
    let transport = Arc::new(
        ScriptedTransport::default()
            .with("https://img.test/1.jpg", Reply::Body(b"one"))
            .with("https://img.test/2a.jpg", Reply::Fail)
            .with("https://img.test/2b.jpg", Reply::Body(b"corrupt"))
            .with("https://img.test/3.jpg", Reply::Body(b"three")),
    );
    let coordinator =
        DownloadCoordinator::new(transport.clone(), Arc::new(RawSaver), settings(Duration::from_secs(10)));

    let jobs = vec![
        job(&root, 1, &["https://img.test/1.jpg"]),
        job(&root, 2, &["https://img.test/2a.jpg", "https://img.test/2b.jpg"]),
        job(&root, 3, &["https://img.test/3.jpg"]),
    ];
    let report = coordinator.fetch_all(jobs).unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.saved.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(!report.timed_out);
    assert!(root.join("2024/03/2024-03-01_us.jpg").is_file());
    assert!(root.join("2024/03/2024-03-03_us.jpg").is_file());
    assert!(!root.join("2024/03/2024-03-02_us.jpg").exists());

    let leftovers = std::fs::read_dir(root.join("2024/03")).unwrap().count();
    assert_eq!(leftovers, 2);
    assert_eq!(transport.calls_to("https://img.test/2a.jpg"), 3);
    assert_eq!(transport.calls_to("https://img.test/2b.jpg"), 3);
}

#[test]
fn later_candidate_used_when_first_fails() {
    let dir = tempfile::tempdir().unwrap();
    let root = root(&dir);
    let transport = Arc::new(
        ScriptedTransport::default()
            .with("https://img.test/full.jpg", Reply::Fail)
            .with("https://img.test/thumb.jpg", Reply::Body(b"thumb")),
    );
    let coordinator =
        DownloadCoordinator::new(transport.clone(), Arc::new(RawSaver), settings(Duration::from_secs(10)));

    let report = coordinator
        .fetch_all(vec![job(
            &root,
            5,
            &["https://img.test/full.jpg", "https://img.test/thumb.jpg"],
        )])
        .unwrap();

    assert_eq!(report.saved.len(), 1);
    assert_eq!(
        std::fs::read(root.join("2024/03/2024-03-05_us.jpg")).unwrap(),
        b"thumb"
    );
    assert_eq!(transport.calls_to("https://img.test/full.jpg"), 1);
}

#[test]
fn deadline_bounds_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let root = root(&dir);
    let transport = Arc::new(
        ScriptedTransport::default()
            .with("https://img.test/fast.jpg", Reply::Body(b"fast"))
            .with("https://img.test/slow.jpg", Reply::Slow(Duration::from_secs(5))),
    );
    let coordinator =
        DownloadCoordinator::new(transport, Arc::new(RawSaver), settings(Duration::from_millis(300)));

    let started = Instant::now();
    let report = coordinator
        .fetch_all(vec![
            job(&root, 1, &["https://img.test/fast.jpg"]),
            job(&root, 2, &["https://img.test/slow.jpg"]),
            job(&root, 3, &["https://img.test/slow.jpg"]),
        ])
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(report.timed_out);
    assert_eq!(report.saved.len(), 1);
    assert_eq!(report.unfinished, 2);
}

#[test]
fn empty_batch_returns_immediately() {
    let coordinator = DownloadCoordinator::new(
        Arc::new(ScriptedTransport::default()),
        Arc::new(RawSaver),
        settings(Duration::from_secs(10)),
    );
    let report = coordinator.fetch_all(Vec::new()).unwrap();
    assert_eq!(report.attempted, 0);
    assert!(!report.timed_out);
}
