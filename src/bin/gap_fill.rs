use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rainfall_gap_filler::gap_fill::{EmptyPlacePolicy, GapFillOptions};
use rainfall_gap_filler::services::{ProcessingReport, RainfallGapFiller};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "gap-fill")]
#[command(about = "Fill missing days in yearly rainfall sheets and write the CSV tables", long_about = None)]
struct Cli {
    /// Spreadsheet files (.xlsx, .xls, .ods, .csv) named after their year, e.g. rain_2020.xlsx
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory for combined_data_<year>.csv, missing_data_<year>.csv and output_data_<year>.csv
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Target year, overriding the one in each file name
    #[arg(long)]
    year: Option<i32>,

    /// Worksheet to read instead of the first one
    #[arg(long, env = "WORKSHEET_NAME")]
    worksheet: Option<String>,

    /// Station expected in every file, even with no rows (repeatable)
    #[arg(long = "expected-place")]
    expected_places: Vec<String>,

    /// What to do with an expected station that has no rows: 'reject' or 'skip'
    #[arg(long, env = "EMPTY_PLACE_POLICY", default_value = "reject")]
    empty_place_policy: EmptyPlacePolicy,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (ignore errors if not found)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    fs::create_dir_all(&cli.output_dir)?;

    let gap_filler = RainfallGapFiller::new(GapFillOptions {
        expected_places: cli.expected_places.clone(),
        empty_place_policy: cli.empty_place_policy,
    });

    let start_time = Instant::now();
    let pb = ProgressBar::new(cli.files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let mut failed = Vec::new();
    for file in &cli.files {
        pb.set_message(file.display().to_string());

        match gap_filler.process_file(file, cli.year, cli.worksheet.clone()) {
            Ok(report) => {
                let written = write_artifacts(&report, &cli.output_dir)?;
                pb.suspend(|| print_summary(file, &report, &written));
            }
            Err(e) => {
                pb.suspend(|| error!("Failed to process {}: {}", file.display(), e));
                failed.push(file.clone());
            }
        }

        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        "Processed {} file(s) in {:?}",
        cli.files.len() - failed.len(),
        start_time.elapsed()
    );

    if !failed.is_empty() {
        for file in &failed {
            warn!("Not processed: {}", file.display());
        }
        return Err(format!("{} of {} file(s) failed", failed.len(), cli.files.len()).into());
    }

    Ok(())
}

/// Write all three tables for one report, returning the paths written
fn write_artifacts(
    report: &ProcessingReport,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut written = Vec::new();
    for artifact in report.artifacts()? {
        let path = output_dir.join(&artifact.file_name);
        fs::write(&path, artifact.content)?;
        written.push(path);
    }
    Ok(written)
}

fn print_summary(file: &Path, report: &ProcessingReport, written: &[PathBuf]) {
    println!("\n{} ({})", file.display(), report.year);
    println!(
        "  Missing data: {}% ({} days)",
        report.missing_percentage_display(),
        report.total_missing_days
    );
    for place in &report.places {
        println!(
            "  {:<30} {:>4} observed {:>4} missing",
            place.place, place.observed_days, place.missing_days
        );
    }
    if report.skipped_rows > 0 {
        println!("  {} row(s) without a Place were skipped", report.skipped_rows);
    }
    for place in &report.skipped_places {
        println!("  {:<30} skipped (no rows)", place);
    }
    for path in written {
        println!("  -> {}", path.display());
    }
}
