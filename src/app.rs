use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::archive::Archive;
use crate::config::Settings;
use crate::domain::{DATE_FORMAT, DownloadService};
use crate::download::{DownloadCoordinator, DownloadReport};
use crate::error::WallpaperError;
use crate::http::HttpTransport;
use crate::image_processing::ImageSaver;
use crate::layout::{MigrationReport, convert_if_needed};
use crate::manual::{IngestReport, ingest_manual_images};
use crate::page_store::PageRecordStore;
use crate::providers::{MetadataProvider, build_provider};
use crate::retention::{TrimReport, trim};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub service: DownloadService,
    pub migration: MigrationReport,
    pub candidates: usize,
    pub already_archived: usize,
    pub provider_error: Option<String>,
    pub downloads: DownloadReport,
    pub manual: IngestReport,
    pub trim: TrimReport,
    pub today: TodayReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct TodayReport {
    pub date: String,
    pub wallpaper: Option<String>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub source: String,
    pub inserted: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App {
    settings: Settings,
    archive: Archive,
    provider: Box<dyn MetadataProvider>,
    coordinator: DownloadCoordinator,
    manual_saver: Arc<dyn ImageSaver>,
}

impl App {
    pub fn new(
        settings: Settings,
        transport: Arc<dyn HttpTransport>,
        download_saver: Arc<dyn ImageSaver>,
        manual_saver: Arc<dyn ImageSaver>,
    ) -> Self {
        let archive = Archive::new(settings.image_dir.clone(), settings.layout);
        let provider = build_provider(&settings, Arc::clone(&transport));
        let coordinator =
            DownloadCoordinator::new(transport, download_saver, settings.download.clone());
        Self {
            settings,
            archive,
            provider,
            coordinator,
            manual_saver,
        }
    }

    pub fn run(&self, today: NaiveDate, sink: &dyn ProgressSink) -> Result<RunReport, WallpaperError> {
        let started = Instant::now();
        let migration = self.convert(sink)?;

        let service = self.provider.service();
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; requesting {service} metadata"),
            elapsed: Some(started.elapsed()),
        });
        let (candidates, provider_error) = match self.provider.fetch_candidates() {
            Ok(candidates) => (candidates, None),
            Err(err) if is_recoverable(&err) => {
                warn!(service = %service, error = %err, "no candidates this run");
                (Vec::new(), Some(err.to_string()))
            }
            Err(err) => return Err(err),
        };
        let candidate_count = candidates.len();
        let (jobs, already_archived) = self
            .archive
            .plan_downloads(candidates, &self.settings.region);
        info!(
            candidates = candidate_count,
            already_archived,
            to_download = jobs.len(),
            "download plan ready"
        );

        sink.event(ProgressEvent {
            message: format!("phase=Download; {} images", jobs.len()),
            elapsed: Some(started.elapsed()),
        });
        let downloads = self.coordinator.fetch_all(jobs)?;

        sink.event(ProgressEvent {
            message: "phase=Manual; ingesting dropped images".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let manual = ingest_manual_images(&self.archive, self.manual_saver.as_ref())?;

        let trim = self.trim(sink)?;
        let today = self.today(today)?;
        sink.event(ProgressEvent {
            message: format!("phase=Done; {} images for today", today.images.len()),
            elapsed: Some(started.elapsed()),
        });

        Ok(RunReport {
            service,
            migration,
            candidates: candidate_count,
            already_archived,
            provider_error,
            downloads,
            manual,
            trim,
            today,
        })
    }

    pub fn convert(&self, sink: &dyn ProgressSink) -> Result<MigrationReport, WallpaperError> {
        sink.event(ProgressEvent {
            message: format!("phase=Layout; checking {}", self.archive.root()),
            elapsed: None,
        });
        convert_if_needed(&self.archive, &self.settings.countries)
    }

    pub fn trim(&self, sink: &dyn ProgressSink) -> Result<TrimReport, WallpaperError> {
        sink.event(ProgressEvent {
            message: format!("phase=Trim; keeping {} images", self.settings.max_images),
            elapsed: None,
        });
        trim(&self.archive, self.settings.max_images)
    }

    pub fn today(&self, today: NaiveDate) -> Result<TodayReport, WallpaperError> {
        let images = self.archive.todays_images(today)?;
        let wallpaper = self.archive.todays_wallpaper(today, &self.settings.region);
        Ok(TodayReport {
            date: today.format(DATE_FORMAT).to_string(),
            wallpaper: wallpaper.map(|path| path.to_string()),
            images: images.into_iter().map(|path| path.to_string()).collect(),
        })
    }

    pub fn seed(
        &self,
        csv: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<SeedReport, WallpaperError> {
        sink.event(ProgressEvent {
            message: format!("phase=Seed; loading {csv}"),
            elapsed: None,
        });
        let mut store = PageRecordStore::open(&self.settings.db_path)?;
        let inserted = store.seed_from_csv(csv)?;
        let total = store.len()?;
        info!(inserted, total, db = %self.settings.db_path, "page store seeded");
        Ok(SeedReport {
            source: csv.to_string(),
            inserted,
            total,
        })
    }
}

// Provider failures only cost this run its candidates.
fn is_recoverable(err: &WallpaperError) -> bool {
    matches!(
        err,
        WallpaperError::RemoteService(_)
            | WallpaperError::RemoteStatus { .. }
            | WallpaperError::MalformedMetadata(_)
            | WallpaperError::InvalidPageUrl(_)
            | WallpaperError::InferenceUnavailable(_)
    )
}
