use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};

use wellbeing_explorer::cleanup::cleanup;
use wellbeing_explorer::config::AppConfig;
use wellbeing_explorer::export::ExportFormat;
use wellbeing_explorer::features::{fields, input_schema, Payload};
use wellbeing_explorer::logging::{init_logging, OperationTimer};
use wellbeing_explorer::models::{Level, PredictionResult, StoredRecord};
use wellbeing_explorer::registry::FileModelRegistry;
use wellbeing_explorer::validation::InputValidator;
use wellbeing_explorer::WellbeingService;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the accepted input ranges as JSON
    Schema,
    /// Predict mood and energy for a JSON payload without saving it
    Predict {
        /// Inline JSON object
        #[arg(conflicts_with = "file")]
        payload: Option<String>,

        /// Read the JSON object from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Log a day: predict and save, replacing any earlier save for the date
    Log {
        /// Date to log (YYYY-MM-DD), today by default
        #[arg(short, long)]
        date: Option<String>,

        /// Cycle phase label
        #[arg(short, long)]
        phase: Option<String>,

        /// Sleep in minutes
        #[arg(long)]
        sleep: Option<i64>,

        /// Resting heart rate in bpm
        #[arg(long)]
        resting_hr: Option<i64>,

        /// Stress severity (0-5)
        #[arg(long)]
        stress: Option<i64>,

        /// Cramps severity (0-5)
        #[arg(long)]
        cramps: Option<i64>,

        /// Headache severity (0-5)
        #[arg(long)]
        headaches: Option<i64>,

        /// Sleep-issue severity (0-5)
        #[arg(long)]
        sleep_issues: Option<i64>,

        /// Yesterday's mood (0-2)
        #[arg(long, requires = "lag_energy", value_parser = clap::value_parser!(i64).range(0..=2))]
        lag_mood: Option<i64>,

        /// Yesterday's energy (0-2)
        #[arg(long, requires = "lag_mood", value_parser = clap::value_parser!(i64).range(0..=2))]
        lag_energy: Option<i64>,
    },
    /// Show one saved day
    Show {
        /// Date (YYYY-MM-DD)
        date: String,
    },
    /// List saved days in a date range
    List {
        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        start_date: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(short, long)]
        end_date: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Calendar and summary for one month
    Month {
        /// Year, current by default
        #[arg(short, long)]
        year: Option<i32>,

        /// Month (1-12), current by default
        #[arg(short, long)]
        month: Option<u32>,
    },
    /// Record the actual mood and/or energy of a saved day
    Label {
        /// Date (YYYY-MM-DD)
        date: String,

        /// Actual mood (0-2)
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=2))]
        mood: Option<i64>,

        /// Actual energy (0-2)
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=2))]
        energy: Option<i64>,
    },
    /// Delete a saved day
    Delete {
        /// Date (YYYY-MM-DD)
        date: String,
    },
    /// Export saved days
    Export {
        /// Start date (YYYY-MM-DD)
        #[arg(short, long)]
        start_date: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(short, long)]
        end_date: Option<String>,

        /// Output format (csv or json)
        #[arg(short, long, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Output file; a timestamped directory under the configured output directory otherwise
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete every stored model version whose name starts with a prefix
    Cleanup {
        /// Model name prefix
        #[arg(short, long)]
        prefix: String,

        /// Only list what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging; the guard flushes the log file on exit
    let _guard = init_logging(&config.logging)?;
    info!("Starting wellbeing explorer");

    let timer = OperationTimer::new("command");
    run(&config, cli.command)?;
    timer.finish();
    Ok(())
}

fn run(config: &AppConfig, command: Commands) -> Result<()> {
    let mut out = std::io::stdout().lock();

    match command {
        Commands::Schema => {
            writeln!(out, "{}", serde_json::to_string_pretty(&input_schema())?)?;
        }
        Commands::Predict { payload, file } => {
            let text = match (payload, file) {
                (Some(inline), None) => inline,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read payload from {}", path.display()))?,
                _ => bail!("Pass a JSON payload inline or with --file"),
            };
            let payload = parse_payload(&text)?;
            let service = WellbeingService::from_config(config)?;
            let prediction = service.predict(&payload)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&prediction)?)?;
        }
        Commands::Log {
            date,
            phase,
            sleep,
            resting_hr,
            stress,
            cramps,
            headaches,
            sleep_issues,
            lag_mood,
            lag_energy,
        } => {
            let date = parse_optional_date(date.as_deref())?.unwrap_or_else(|| Local::now().date_naive());
            let service = WellbeingService::from_config(config)?;

            let mut payload = service.prefill(date)?;
            if let Some(phase) = phase {
                payload.insert(fields::PHASE.into(), Value::from(phase));
            }
            for (field, value) in [
                (fields::SLEEP_DURATION_MINUTES, sleep),
                (fields::RESTING_HEART_RATE, resting_hr),
                (fields::STRESS_NUM, stress),
                (fields::CRAMPS_NUM, cramps),
                (fields::HEADACHES_NUM, headaches),
                (fields::SLEEPISSUE_NUM, sleep_issues),
                (fields::LAG1_MOOD, lag_mood),
                (fields::LAG1_ENERGY, lag_energy),
            ] {
                if let Some(value) = value {
                    payload.insert(field.into(), Value::from(value));
                }
            }

            let prediction = service.log_day(date, &payload)?;
            print_prediction(&mut out, date, &prediction)?;
        }
        Commands::Show { date } => {
            let date = InputValidator::parse_entry_date(&date)?;
            let service = WellbeingService::from_config(config)?;
            match service.day(date)? {
                Some(record) => writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?,
                None => writeln!(out, "Nothing saved for {date}")?,
            }
        }
        Commands::List {
            start_date,
            end_date,
            json,
        } => {
            let start = parse_optional_date(start_date.as_deref())?;
            let end = parse_optional_date(end_date.as_deref())?;
            let service = WellbeingService::from_config(config)?;
            let records = service.history(start, end)?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?;
            } else {
                print_table(&mut out, &records)?;
            }
        }
        Commands::Month { year, month } => {
            let today = Local::now().date_naive();
            let year = year.unwrap_or_else(|| today.year());
            let month = month.unwrap_or_else(|| today.month());
            let service = WellbeingService::from_config(config)?;
            let (days, summary) = service.month(year, month)?;

            writeln!(out, "{year}-{month:02}")?;
            for day in days.iter().filter(|d| d.logged) {
                writeln!(
                    out,
                    "  {}  mood {:<6}  energy {:<6}",
                    day.date,
                    day.mood.map_or("-", Level::label),
                    day.energy.map_or("-", Level::label)
                )?;
            }
            writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        }
        Commands::Label { date, mood, energy } => {
            let date = InputValidator::parse_entry_date(&date)?;
            if mood.is_none() && energy.is_none() {
                bail!("Pass --mood and/or --energy");
            }
            let mood = mood.map(|m| InputValidator::validate_level("mood", m)).transpose()?;
            let energy = energy
                .map(|e| InputValidator::validate_level("energy", e))
                .transpose()?;
            let service = WellbeingService::from_config(config)?;
            if service.label(date, mood, energy)? {
                writeln!(out, "Labelled {date}")?;
            } else {
                warn!(%date, "Label requested for a day that was never logged");
                bail!("Nothing saved for {date}; log the day first");
            }
        }
        Commands::Delete { date } => {
            let date = InputValidator::parse_entry_date(&date)?;
            let service = WellbeingService::from_config(config)?;
            if service.delete(date)? {
                writeln!(out, "Deleted {date}")?;
            } else {
                writeln!(out, "Nothing saved for {date}")?;
            }
        }
        Commands::Export {
            start_date,
            end_date,
            format,
            output,
        } => {
            let start = parse_optional_date(start_date.as_deref())?;
            let end = parse_optional_date(end_date.as_deref())?;
            let service = WellbeingService::from_config(config)?;
            match output {
                Some(path) => {
                    let rows = service.export(start, end, format, &path)?;
                    writeln!(out, "Wrote {rows} days to {}", path.display())?;
                }
                None => {
                    let dir = PathBuf::from(&config.export.output_directory);
                    match service.export_to_dir(start, end, format, &dir)? {
                        Some(path) => writeln!(out, "Wrote {}", path.display())?,
                        None => writeln!(out, "No saved days in range")?,
                    }
                }
            }
        }
        Commands::Cleanup { prefix, dry_run } => {
            let registry = FileModelRegistry::new(&config.models.registry_dir, config.models.version);
            let outcomes = cleanup(&registry, &prefix, dry_run)?;
            if outcomes.is_empty() {
                writeln!(out, "No model versions match {prefix:?}")?;
            }
            for outcome in &outcomes {
                writeln!(out, "{outcome}")?;
            }
            let failed = outcomes.iter().filter(|o| o.is_failure()).count();
            if failed > 0 {
                bail!("{failed} model version(s) could not be deleted");
            }
        }
    }

    Ok(())
}

fn parse_payload(text: &str) -> Result<Payload> {
    match serde_json::from_str::<Value>(text).context("Payload is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("Payload must be a JSON object, got {other}"),
    }
}

fn parse_optional_date(input: Option<&str>) -> Result<Option<NaiveDate>> {
    Ok(input.map(InputValidator::parse_entry_date).transpose()?)
}

fn level_text(class: Option<i64>) -> String {
    class
        .and_then(Level::from_class)
        .map_or_else(|| "-".to_string(), |l| format!("{l} ({})", l.class()))
}

fn print_prediction(out: &mut impl Write, date: NaiveDate, prediction: &PredictionResult) -> Result<()> {
    writeln!(out, "Saved {date} (route {})", prediction.route)?;
    writeln!(out, "  mood:   {}", level_text(Some(i64::from(prediction.mood_pred))))?;
    writeln!(out, "  energy: {}", level_text(Some(i64::from(prediction.energy_pred))))?;
    Ok(())
}

fn print_table(out: &mut impl Write, records: &[StoredRecord]) -> Result<()> {
    if records.is_empty() {
        writeln!(out, "No saved days")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:<10}  {:<16}  {:>5}  {:>3}  {:>6}  {:<12}  {:<12}  route",
        "date", "phase", "sleep", "rhr", "stress", "mood", "energy"
    )?;
    for r in records {
        writeln!(
            out,
            "{:<10}  {:<16}  {:>5.1}  {:>3}  {:>6}  {:<12}  {:<12}  {}",
            r.entry_date,
            r.phase,
            r.sleep_hours(),
            r.resting_heart_rate,
            r.stress_num,
            level_text(r.mood_pred),
            level_text(r.energy_pred),
            r.route.map_or_else(|| "-".to_string(), |route| route.to_string())
        )?;
    }
    Ok(())
}
