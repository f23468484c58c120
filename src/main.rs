//! CLI entry point for the bus attendance tools.
//!
//! Provides subcommands for attendance summaries and reports, submitting a
//! day's attendance, the management overview, feedback, push notifications
//! and bus location.

use anyhow::{Context, Result, bail};
use bus_attendance::analyzers::analyzer::{bus_summaries, day_report, fleet_overview, student_report};
use bus_attendance::bus_id::BusId;
use bus_attendance::config::Settings;
use bus_attendance::feedback::{Feedback, newest_first};
use bus_attendance::fetch::auth::{HeaderAuth, QueryKey};
use bus_attendance::fetch::{BasicClient, HttpClient};
use bus_attendance::infra::firestore::FirestoreClient;
use bus_attendance::infra::snapshot::SnapshotStore;
use bus_attendance::location::{BusLocation, max_age_from_secs};
use bus_attendance::model::AttendanceStatus;
use bus_attendance::notify::{Notification, NotifyClient};
use bus_attendance::output::{append_summaries, print_json, summary_line};
use bus_attendance::report::mailto_url;
use bus_attendance::services::store::AttendanceStore;
use bus_attendance::submission::{AttendanceSheet, Submitter, submit};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bus_attendance")]
#[command(about = "College bus attendance, feedback and notification tools", long_about = None)]
struct Cli {
    /// Use a local JSON snapshot instead of Firestore
    #[arg(long, global = true, value_name = "FILE")]
    snapshot: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily attendance summaries for a bus, newest first
    Summary {
        /// Bus identifier, e.g. SIET-005 or 5
        bus: String,

        /// Trailing window in days (defaults to ATTENDANCE_WINDOW_DAYS)
        #[arg(short, long)]
        days: Option<u32>,

        /// Maximum number of summaries (defaults to SUMMARY_LIMIT)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print summaries as JSON, including per-student breakdowns
        #[arg(long, default_value_t = false)]
        json: bool,

        /// CSV file to append summary rows to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Compose the emailable report for one bus and day
    Report {
        bus: String,

        /// Day in YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Recipient address; prints a mailto: link when given
        #[arg(long)]
        to: Option<String>,
    },
    /// One student's attendance on a bus over the window
    Student {
        bus: String,
        student_id: String,

        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Attendance totals for several buses
    Overview {
        /// Comma-separated bus identifiers
        #[arg(value_delimiter = ',', required = true)]
        buses: Vec<String>,

        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Submit a day's attendance, replacing any earlier submission
    Submit {
        bus: String,

        /// Submitting co-admin's user id
        #[arg(long)]
        submitter_id: String,

        /// Submitting co-admin's display name
        #[arg(long)]
        submitter_name: String,

        /// Day in YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Student ids to mark present
        #[arg(long, value_delimiter = ',')]
        present: Vec<String>,

        /// Student ids to mark absent
        #[arg(long, value_delimiter = ',')]
        absent: Vec<String>,

        /// Status for every student not listed ("present" or "absent")
        #[arg(long)]
        remaining: Option<String>,
    },
    /// Submit feedback about a bus
    Feedback {
        bus: String,

        #[arg(long)]
        author_id: String,

        #[arg(long)]
        author_name: Option<String>,

        #[arg(long)]
        category: Option<String>,

        /// Rating from 1 to 5
        #[arg(long)]
        rating: Option<u8>,

        message: String,
    },
    /// List feedback for a bus, newest first
    ListFeedback {
        bus: String,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Register a device push token for a user
    RegisterToken { user_id: String, token: String },
    /// Send a push notification to everyone assigned to a bus
    Notify {
        bus: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        body: String,
    },
    /// Publish a bus position
    PublishLocation {
        bus: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(long)]
        speed: Option<f64>,

        #[arg(long)]
        heading: Option<f64>,

        #[arg(long)]
        driver_id: Option<String>,
    },
    /// Show the latest bus position
    Location {
        bus: String,

        /// Age after which the position is reported as stale
        #[arg(long, default_value_t = 300)]
        max_age_secs: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bus_attendance.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_attendance.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let store = open_store(&settings, cli.snapshot.as_deref())?;
    let bus = |raw: &str| BusId::parse(raw, &settings.bus_prefix);
    let today = Utc::now().with_timezone(&settings.offset()?).date_naive();

    match cli.command {
        Commands::Summary {
            bus: raw,
            days,
            limit,
            json,
            output,
        } => {
            let bus = bus(&raw);
            let days = days.unwrap_or(settings.window_days);
            let limit = limit.unwrap_or(settings.summary_limit);
            let summaries = bus_summaries(store.as_ref(), &bus, days, limit, today).await?;

            if json {
                print_json(&summaries)?;
            } else {
                for s in &summaries {
                    println!("{}", summary_line(s));
                }
            }
            info!(bus = %bus, days, count = summaries.len(), "Summary complete");

            if let Some(path) = output {
                append_summaries(&path, &summaries)?;
                info!(path = %path, "Summary rows appended");
            }
        }
        Commands::Report { bus: raw, date, to } => {
            let bus = bus(&raw);
            let date = date.unwrap_or(today);
            let Some(report) = day_report(store.as_ref(), &bus, date, settings.offset()?).await? else {
                bail!("no attendance submitted for {bus} on {date}");
            };

            println!("{}", report.body);
            if let Some(to) = to {
                println!();
                println!("{}", mailto_url(&to, &report.subject, &report.body));
            }
        }
        Commands::Student {
            bus: raw,
            student_id,
            days,
        } => {
            let days = days.unwrap_or(settings.window_days);
            let history = student_report(store.as_ref(), &bus(&raw), &student_id, days, today).await?;
            print_json(&history)?;
        }
        Commands::Overview { buses, days } => {
            let buses: Vec<BusId> = buses.iter().map(|b| bus(b)).collect();
            let days = days.unwrap_or(settings.window_days);
            let overview = fleet_overview(store.as_ref(), &buses, days, today).await?;

            if overview.buses.len() < buses.len() {
                warn!(
                    requested = buses.len(),
                    loaded = overview.buses.len(),
                    "Some buses could not be loaded"
                );
            }
            print_json(&overview)?;
        }
        Commands::Submit {
            bus: raw,
            submitter_id,
            submitter_name,
            date,
            present,
            absent,
            remaining,
        } => {
            let bus = bus(&raw);
            let date = date.unwrap_or(today);
            let now = Utc::now();
            let roster = store.roster_for_bus(&bus).await?;

            let submitter = Submitter {
                id: submitter_id,
                name: submitter_name,
            };
            let mut sheet = AttendanceSheet::new(bus.clone(), date, submitter, &roster);
            for id in &present {
                sheet.mark(id, AttendanceStatus::Present, now)?;
            }
            for id in &absent {
                sheet.mark(id, AttendanceStatus::Absent, now)?;
            }
            if let Some(status) = remaining {
                let status = AttendanceStatus::parse(&status);
                if !status.is_marked() {
                    bail!("--remaining must be 'present' or 'absent'");
                }
                sheet.mark_remaining(status, now);
            }

            let unmarked = sheet.unmarked().len();
            if unmarked > 0 {
                warn!(unmarked, "Students left unmarked are not included");
            }
            let record = sheet.into_record(now)?;
            submit(store.as_ref(), &record).await?;
            println!("{}", record.document_id());
        }
        Commands::Feedback {
            bus: raw,
            author_id,
            author_name,
            category,
            rating,
            message,
        } => {
            let feedback = Feedback::new(
                bus(&raw),
                &author_id,
                author_name.as_deref(),
                category.as_deref(),
                &message,
                rating,
                Utc::now(),
            )?;
            let id = store.submit_feedback(&feedback).await?;
            info!(id = %id, bus = %feedback.bus_id, "Feedback submitted");
            println!("{id}");
        }
        Commands::ListFeedback { bus: raw, limit } => {
            let feedback = newest_first(store.feedback_for_bus(&bus(&raw)).await?, limit);
            print_json(&feedback)?;
        }
        Commands::RegisterToken { user_id, token } => {
            store.register_push_token(&user_id, &token).await?;
            info!(user_id = %user_id, "Push token registered");
        }
        Commands::Notify {
            bus: raw,
            title,
            body,
        } => {
            let bus = bus(&raw);
            let registry = store.push_tokens_for_bus(&bus).await?;
            let tokens = registry.all_tokens();

            let notify = NotifyClient::new(notify_http(&settings)?, settings.require_notify_endpoint()?);
            let notification = Notification {
                tokens,
                title,
                body,
                data: HashMap::from([("busId".to_string(), bus.to_string())]),
            };
            let sent = notify.send(&notification).await?;
            info!(bus = %bus, users = registry.len(), sent, "Notify complete");
            println!("{sent}");
        }
        Commands::PublishLocation {
            bus: raw,
            lat,
            lon,
            speed,
            heading,
            driver_id,
        } => {
            let mut location = BusLocation::new(bus(&raw), lat, lon, Utc::now())?;
            location.speed = speed;
            location.heading = heading;
            location.updated_by = driver_id;
            store.publish_location(&location).await?;
            info!(bus = %location.bus_id, "Location published");
        }
        Commands::Location {
            bus: raw,
            max_age_secs,
        } => {
            let bus = bus(&raw);
            let max_age = max_age_from_secs(max_age_secs)?;
            match store.latest_location(&bus).await? {
                Some(location) => {
                    let stale = location.is_stale(Utc::now(), max_age);
                    print_json(&serde_json::json!({ "location": location, "stale": stale }))?;
                    info!(bus = %bus, stale, "Latest location");
                }
                None => warn!(bus = %bus, "No location published for bus"),
            }
        }
    }

    Ok(())
}

/// Opens the snapshot store when a path is given, Firestore otherwise.
fn open_store(settings: &Settings, snapshot: Option<&str>) -> Result<Box<dyn AttendanceStore>> {
    if let Some(path) = snapshot {
        info!(path, "Using local snapshot store");
        let store = SnapshotStore::open(path, &settings.bus_prefix)
            .with_context(|| format!("failed to open snapshot {path}"))?;
        return Ok(Box::new(store));
    }

    let project = settings.require_project()?;
    let mut http: Box<dyn HttpClient> = Box::new(BasicClient::new()?);
    if let Some(token) = &settings.id_token {
        http = Box::new(HeaderAuth::bearer(http, token)?);
    }
    if let Some(key) = &settings.api_key {
        http = Box::new(QueryKey::new(http, "key", key));
    } else {
        warn!("FIREBASE_API_KEY not set, requests rely on the ID token alone");
    }

    info!(project, "Using Firestore store");
    Ok(Box::new(FirestoreClient::new(http, project, &settings.bus_prefix)))
}

fn notify_http(settings: &Settings) -> Result<Box<dyn HttpClient>> {
    let http: Box<dyn HttpClient> = Box::new(BasicClient::new()?);
    match &settings.notify_api_key {
        Some(key) => Ok(Box::new(HeaderAuth::bearer(http, key)?)),
        None => Ok(http),
    }
}
