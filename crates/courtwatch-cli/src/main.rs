use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use courtwatch::calendar::HolidayCalendar;
use courtwatch::config::ScanConfig;
use courtwatch::holidays::{JapaneseHolidays, SUPPORTED_YEARS};
use courtwatch::notify::{Dispatcher, GmailSender, LogSender, MailSender};
use courtwatch::report::ScanReport;
use courtwatch::scanner::{HitSink, Scanner};
use courtwatch::session::{BrowserOptions, WebDriverSession, WebSession};
use courtwatch::types::{FilterMode, Hit, ScanBudget, ScanWindow};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "courtwatch")]
#[command(about = "Tokyo metropolitan park court availability scanner", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, clap::Args)]
struct Overrides {
    #[arg(short = 'c', long, global = true, help = "JSON configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        global = true,
        help = "First date to search (default: tomorrow)",
        value_parser = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string()),
    )]
    date: Option<NaiveDate>,

    #[arg(long, global = true, help = "Number of weeks to page through after the first")]
    weeks: Option<u32>,

    #[arg(long, value_name = "SECONDS", global = true, help = "Wall-clock budget for the sweep")]
    budget: Option<u64>,

    #[arg(
        long,
        global = true,
        value_parser = parse_mode,
        help = "Which dates to report: holiday-only, weekday-only or all"
    )]
    mode: Option<FilterMode>,

    #[arg(
        short = 'f',
        long = "facility",
        global = true,
        help = "Facility keyword (repeatable, replaces the configured list)"
    )]
    facilities: Vec<String>,

    #[arg(long, global = true, default_value = "http://localhost:9515", help = "WebDriver URL")]
    webdriver: String,

    #[arg(long, global = true, help = "Show the browser window")]
    headed: bool,

    #[arg(long, global = true, help = "Chrome user data directory to reuse")]
    profile_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Notification recipient")]
    to: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep all facilities and mail every newly found slot
    Scan {
        #[arg(long, help = "Log notifications instead of sending them")]
        dry_run: bool,
    },
    /// Sweep all facilities and print the report without sending mail
    Check {
        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// List the Japanese public holidays of a year
    Holidays {
        #[arg(long, help = "Year to list (default: this year)")]
        year: Option<i32>,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
}

fn parse_mode(s: &str) -> Result<FilterMode, String> {
    FilterMode::from_str(s).map_err(|e| e.to_string())
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn load_config(overrides: &Overrides) -> ScanConfig {
    let mut config = match &overrides.config {
        Some(path) => ScanConfig::load(path).unwrap_or_else(|e| {
            log::error!("Error loading config: {}", e);
            process::exit(1);
        }),
        None => ScanConfig::default(),
    };

    if overrides.date.is_some() {
        config.target_date = overrides.date;
    }
    if let Some(weeks) = overrides.weeks {
        config.extra_weeks = weeks;
    }
    if let Some(secs) = overrides.budget {
        config.budget_secs = secs;
    }
    if let Some(mode) = overrides.mode {
        config.filter = mode;
    }
    if !overrides.facilities.is_empty() {
        config.facilities = overrides.facilities.clone();
    }
    if overrides.to.is_some() {
        config.mail.to = overrides.to.clone();
    }

    config.validate().unwrap_or_else(|e| {
        log::error!("Invalid config: {e}");
        process::exit(1);
    })
}

fn browser_options(overrides: &Overrides) -> BrowserOptions {
    BrowserOptions {
        webdriver_url: overrides.webdriver.clone(),
        headless: !overrides.headed,
        profile_dir: overrides.profile_dir.clone(),
        ..BrowserOptions::default()
    }
}

/// Runs one sweep, always closing the browser afterwards.
async fn sweep(
    config: &ScanConfig,
    browser: &BrowserOptions,
    window: ScanWindow,
    sink: &mut dyn HitSink,
) -> Result<ScanReport, courtwatch::SessionError> {
    let session = WebDriverSession::connect(browser).await?;
    let holidays = config.holiday_table();
    let calendar = holidays.as_ref().map(|h| h as &dyn HolidayCalendar);
    let budget = ScanBudget::new(config.budget());

    log::info!(
        "Sweeping {} facilities from {} (+{} weeks, {}, budget {:?})",
        config.facilities.len(),
        window.start,
        window.extra_weeks,
        config.filter,
        config.budget()
    );
    let report = Scanner::new(&session, config, calendar)
        .scan(&config.facilities, window, &budget, sink)
        .await;

    if let Err(e) = session.close().await {
        log::warn!("Error closing browser session: {}", e);
    }
    Ok(report)
}

async fn scan_and_notify<M: MailSender>(
    config: &ScanConfig,
    browser: &BrowserOptions,
    window: ScanWindow,
    mailer: M,
    to: String,
) -> i32 {
    let mut dispatcher = Dispatcher::new(mailer, to, config.mail.subject.clone(), config.mail.workers);

    let (code, failure) = match sweep(config, browser, window, &mut dispatcher).await {
        Ok(report) => {
            println!("{}", report);
            let failure = report.has_failures().then(|| report.to_string());
            (0, failure)
        }
        Err(e) => {
            log::error!("Browser session failed: {}", e);
            (1, Some(e.to_string()))
        }
    };

    if let Some(text) = failure.filter(|_| config.notify_on_failure) {
        dispatcher.notify_failure(&text);
    }

    let summary = dispatcher.shutdown().await;
    log::info!(
        "Notifications: {} sent, {} failed",
        summary.sent,
        summary.failed
    );
    code
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match cli.command {
        Commands::Scan { dry_run } => {
            let config = load_config(&cli.overrides);
            let browser = browser_options(&cli.overrides);
            let window = config.window(Local::now().date_naive());

            let code = if dry_run {
                let to = config.mail.to.clone().unwrap_or_else(|| "(dry-run)".to_string());
                scan_and_notify(&config, &browser, window, LogSender, to).await
            } else {
                let Some(to) = config.mail.to.clone() else {
                    log::error!("No recipient configured (set mail.to or pass --to)");
                    process::exit(1);
                };
                let mailer = GmailSender::from_token_file(&config.mail.token_path)
                    .unwrap_or_else(|e| {
                        log::error!("Error setting up Gmail: {}", e);
                        process::exit(1);
                    });
                scan_and_notify(&config, &browser, window, mailer, to).await
            };
            process::exit(code);
        }

        Commands::Check { format } => {
            let config = load_config(&cli.overrides);
            let browser = browser_options(&cli.overrides);
            let window = config.window(Local::now().date_naive());

            let mut sink = |hit: &Hit| log::debug!("Hit: {} {}", hit.facility, hit.date_code);
            let report = sweep(&config, &browser, window, &mut sink)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Browser session failed: {}", e);
                    process::exit(1);
                });

            match format {
                OutputFormat::Json => serialize_json(&report),
                OutputFormat::Text => println!("{}", report),
            }
        }

        Commands::Holidays { year, format } => {
            let year = year.unwrap_or_else(|| Local::now().year());
            if !SUPPORTED_YEARS.contains(&year) {
                log::error!(
                    "Year {} is outside the supported range {}-{}",
                    year,
                    SUPPORTED_YEARS.start(),
                    SUPPORTED_YEARS.end()
                );
                process::exit(1);
            }

            let holidays = JapaneseHolidays.holidays_in(year);
            match format {
                OutputFormat::Json => serialize_json(&holidays),
                OutputFormat::Text => {
                    for (date, name) in &holidays {
                        println!("{} ({}) {}", date, courtwatch::types::weekday_label(*date), name);
                    }
                    println!("\n{} holidays in {}", holidays.len(), year);
                }
            }
        }
    }
}
