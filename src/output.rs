use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RunReport, SeedReport, TodayReport};
use crate::layout::MigrationReport;
use crate::retention::TrimReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_migration(result: &MigrationReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_trim(result: &TrimReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_today(result: &TodayReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_seed(result: &SeedReport) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_run(result: &RunReport) {
        println!("service: {}", result.service);
        if let Some(from) = result.migration.from {
            println!(
                "layout: converted {} images from {from} to {}",
                result.migration.moved, result.migration.to
            );
        }
        match &result.provider_error {
            Some(err) => println!("candidates: none ({err})"),
            None => println!(
                "candidates: {} ({} already archived)",
                result.candidates, result.already_archived
            ),
        }
        println!(
            "downloaded: {} saved, {} failed",
            result.downloads.saved.len(),
            result.downloads.failed.len()
        );
        if result.downloads.timed_out {
            println!(
                "deadline reached with {} downloads unfinished",
                result.downloads.unfinished
            );
        }
        if !result.manual.ingested.is_empty() || !result.manual.failed.is_empty() {
            println!(
                "manual: {} ingested, {} failed",
                result.manual.ingested.len(),
                result.manual.failed.len()
            );
        }
        Self::print_trim(&result.trim);
        Self::print_today(&result.today);
    }

    pub fn print_migration(result: &MigrationReport) {
        match result.from {
            Some(from) => println!(
                "converted {} images from {from} to {} ({} left in place)",
                result.moved, result.to, result.skipped
            ),
            None => println!("archive already uses the {} layout", result.to),
        }
    }

    pub fn print_trim(result: &TrimReport) {
        println!(
            "retention: {} scanned, {} removed",
            result.scanned,
            result.removed.len()
        );
        if !result.stale_temp_files.is_empty() {
            println!(
                "retention: {} stale temp files removed",
                result.stale_temp_files.len()
            );
        }
    }

    pub fn print_today(result: &TodayReport) {
        match &result.wallpaper {
            Some(path) => println!("wallpaper for {}: {path}", result.date),
            None => println!("no wallpaper archived for {}", result.date),
        }
        for path in &result.images {
            println!("  {path}");
        }
    }

    pub fn print_seed(result: &SeedReport) {
        println!(
            "seeded {} page records from {} ({} stored)",
            result.inserted, result.source, result.total
        );
    }
}

impl ProgressSink for HumanOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
