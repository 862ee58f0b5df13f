use std::fs;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DownloadSettings;
use crate::domain::ImageDownloadData;
use crate::error::WallpaperError;
use crate::http::HttpTransport;
use crate::image_processing::ImageSaver;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub attempted: usize,
    pub saved: Vec<String>,
    pub failed: Vec<String>,
    pub unfinished: usize,
    pub timed_out: bool,
}

impl DownloadReport {
    fn finished(&self) -> usize {
        self.saved.len() + self.failed.len()
    }
}

struct ItemOutcome {
    target: String,
    result: Result<String, WallpaperError>,
}

// Work still running at the deadline is abandoned. The next run's existence
// check picks it up, and trim removes its temp file.
pub struct DownloadCoordinator {
    transport: Arc<dyn HttpTransport>,
    saver: Arc<dyn ImageSaver>,
    settings: DownloadSettings,
}

impl DownloadCoordinator {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        saver: Arc<dyn ImageSaver>,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            transport,
            saver,
            settings,
        }
    }

    pub fn fetch_all(
        &self,
        jobs: Vec<ImageDownloadData>,
    ) -> Result<DownloadReport, WallpaperError> {
        let mut report = DownloadReport {
            attempted: jobs.len(),
            ..DownloadReport::default()
        };
        if jobs.is_empty() {
            return Ok(report);
        }

        let (job_tx, job_rx) = mpsc::channel::<ImageDownloadData>();
        for job in jobs {
            job_tx
                .send(job)
                .map_err(|err| WallpaperError::DownloadFailed(err.to_string()))?;
        }
        drop(job_tx);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (done_tx, done_rx) = mpsc::channel::<ItemOutcome>();

        let workers = self.settings.workers.max(1).min(report.attempted);
        let started = Instant::now();
        let deadline = started + self.settings.batch_timeout;
        info!(
            items = report.attempted,
            workers,
            deadline_secs = self.settings.batch_timeout.as_secs_f64(),
            "starting downloads"
        );

        for index in 0..workers {
            let job_rx = Arc::clone(&job_rx);
            let done_tx = done_tx.clone();
            let transport = Arc::clone(&self.transport);
            let saver = Arc::clone(&self.saver);
            let attempts = self.settings.attempts;
            thread::Builder::new()
                .name(format!("download-{index}"))
                .spawn(move || {
                    loop {
                        let next = match job_rx.lock() {
                            Ok(queue) => queue.recv(),
                            Err(_) => break,
                        };
                        let Ok(job) = next else {
                            break;
                        };
                        let outcome = ItemOutcome {
                            target: job.target_path().to_string(),
                            result: fetch_item(transport.as_ref(), saver.as_ref(), &job, attempts),
                        };
                        if done_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|err| {
                    WallpaperError::DownloadFailed(format!("spawn download worker: {err}"))
                })?;
        }
        drop(done_tx);

        while report.finished() < report.attempted {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                report.timed_out = true;
                break;
            }
            match done_rx.recv_timeout(remaining) {
                Ok(outcome) => match outcome.result {
                    Ok(url) => {
                        debug!(file = %outcome.target, url = %url, "image saved");
                        report.saved.push(outcome.target);
                    }
                    Err(err) => {
                        warn!(file = %outcome.target, error = %err, "image download failed");
                        report.failed.push(outcome.target);
                    }
                },
                Err(RecvTimeoutError::Timeout) => {
                    report.timed_out = true;
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        report.unfinished = report.attempted - report.finished();
        if report.timed_out {
            warn!(
                unfinished = report.unfinished,
                "download deadline reached, abandoning outstanding items"
            );
        }
        info!(
            saved = report.saved.len(),
            failed = report.failed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "downloads finished"
        );
        Ok(report)
    }
}

fn fetch_item(
    transport: &dyn HttpTransport,
    saver: &dyn ImageSaver,
    job: &ImageDownloadData,
    attempts: u32,
) -> Result<String, WallpaperError> {
    let destination = job.target_path();
    if job.candidate_urls.is_empty() {
        return Err(WallpaperError::DownloadFailed(format!(
            "{destination}: no candidate URLs"
        )));
    }
    fs::create_dir_all(job.target_directory.as_std_path()).map_err(|err| {
        WallpaperError::Filesystem(format!("create {}: {err}", job.target_directory))
    })?;

    let mut last_error = None;
    for attempt in 1..=attempts.max(1) {
        for url in &job.candidate_urls {
            let result = transport
                .get(url, &[])
                .and_then(|bytes| saver.save(&bytes, &destination, &job.title, &job.copyright));
            match result {
                Ok(()) => return Ok(url.clone()),
                Err(err) => {
                    debug!(attempt, url = %url, error = %err, "candidate failed");
                    last_error = Some(err);
                }
            }
        }
    }
    let cause = last_error.map(|err| err.to_string()).unwrap_or_default();
    Err(WallpaperError::DownloadFailed(format!(
        "{destination}: {cause}"
    )))
}
