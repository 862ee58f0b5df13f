use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use chrono::Local;
use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use daily_wallpaper::app::App;
use daily_wallpaper::config::{ConfigLoader, Settings};
use daily_wallpaper::error::WallpaperError;
use daily_wallpaper::http::ReqwestTransport;
use daily_wallpaper::image_processing::JpegSaver;
use daily_wallpaper::output::{HumanOutput, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "daily-wallpaper")]
#[command(about = "Archive the image of the day into a date-organized directory tree")]
#[command(version, author)]
struct Cli {
    /// Path to a daily-wallpaper.toml file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print machine-readable reports to stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Convert, download, ingest, trim and list today's images (default)")]
    Run,
    #[command(about = "Convert the archive to the configured layout")]
    Convert,
    #[command(about = "Delete the oldest images beyond the retention bound")]
    Trim,
    #[command(about = "List the archived images for today")]
    Today,
    #[command(about = "Load page calibration records from a CSV file")]
    SeedDb { csv: Utf8PathBuf },
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<WallpaperError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &WallpaperError) -> u8 {
    match error {
        WallpaperError::ConfigRead(_)
        | WallpaperError::ConfigParse(_)
        | WallpaperError::InvalidConfig(_) => 2,
        WallpaperError::RemoteService(_) | WallpaperError::RemoteStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let settings = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = build_app(settings)?;
    let today = Local::now().date_naive();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => match output_mode {
            OutputMode::Json => {
                let result = app.run(today, &JsonOutput)?;
                JsonOutput::print_run(&result).into_diagnostic()
            }
            OutputMode::Human => {
                let result = app.run(today, &HumanOutput)?;
                HumanOutput::print_run(&result);
                Ok(())
            }
        },
        Command::Convert => match output_mode {
            OutputMode::Json => {
                let result = app.convert(&JsonOutput)?;
                JsonOutput::print_migration(&result).into_diagnostic()
            }
            OutputMode::Human => {
                let result = app.convert(&HumanOutput)?;
                HumanOutput::print_migration(&result);
                Ok(())
            }
        },
        Command::Trim => match output_mode {
            OutputMode::Json => {
                let result = app.trim(&JsonOutput)?;
                JsonOutput::print_trim(&result).into_diagnostic()
            }
            OutputMode::Human => {
                let result = app.trim(&HumanOutput)?;
                HumanOutput::print_trim(&result);
                Ok(())
            }
        },
        Command::Today => {
            let result = app.today(today)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_today(&result).into_diagnostic(),
                OutputMode::Human => {
                    HumanOutput::print_today(&result);
                    Ok(())
                }
            }
        }
        Command::SeedDb { csv } => match output_mode {
            OutputMode::Json => {
                let result = app.seed(&csv, &JsonOutput)?;
                JsonOutput::print_seed(&result).into_diagnostic()
            }
            OutputMode::Human => {
                let result = app.seed(&csv, &HumanOutput)?;
                HumanOutput::print_seed(&result);
                Ok(())
            }
        },
    }
}

fn build_app(settings: Settings) -> Result<App, WallpaperError> {
    let transport = Arc::new(ReqwestTransport::new(settings.download.request_timeout)?);
    let quality = settings.jpg_quality;
    Ok(App::new(
        settings,
        transport,
        Arc::new(JpegSaver::new(quality)),
        Arc::new(JpegSaver::normalizing(quality)),
    ))
}
