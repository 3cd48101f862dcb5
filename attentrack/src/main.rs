//! attentrack - CLI for attention tracking configuration and the metrics backend
//!
//! This tool provides commands for:
//! - Checking tracking and sync configuration
//! - Reading aggregate analytics and daily summaries
//! - Viewing and changing tracking preferences stored by the backend
//! - Requesting erasure of all attention data
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/attentrack/config.toml (~/.config/attentrack/config.toml)
//! - Logs: $XDG_STATE_HOME/attentrack/attentrack.log (~/.local/state/attentrack/attentrack.log)

use anyhow::{bail, Context, Result};
use attentrack_core::sync::{AttentionPreferences, MetricsClient};
use attentrack_core::{AttentionConfig, Config};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "attentrack")]
#[command(about = "Attention tracking configuration and analytics")]
#[command(version)]
struct Args {
    /// Write logs to the state directory
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show tracking and sync configuration
    Status,

    /// Show aggregate focus analytics
    Analytics {
        /// Number of days to include
        #[arg(short, long, default_value = "7")]
        days: u32,
    },

    /// Show per-day rollups
    Summary {
        /// Number of days to include
        #[arg(short, long, default_value = "7")]
        days: u32,
    },

    /// Show or change tracking preferences stored by the backend
    Prefs {
        /// Master switch for tracking
        #[arg(long)]
        tracking: Option<bool>,

        /// Camera-based gaze tracking
        #[arg(long)]
        gaze: Option<bool>,

        /// Tab-visibility tracking
        #[arg(long)]
        tab: Option<bool>,

        /// Input-idle tracking
        #[arg(long)]
        idle: Option<bool>,

        /// Idle threshold in seconds
        #[arg(long)]
        idle_threshold: Option<u64>,

        /// Look-away threshold in seconds
        #[arg(long)]
        look_away_threshold: Option<u64>,
    },

    /// Ask the backend to delete all attention data
    Forget {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = if args.verbose {
        let guard = attentrack_core::logging::init(&config.logging)
            .context("failed to initialize logging")?;
        Some(guard)
    } else {
        None
    };

    match args.command {
        Command::Status => cmd_status(&config),
        Command::Analytics { days } => with_client(&config, |client| cmd_analytics(client, days)),
        Command::Summary { days } => with_client(&config, |client| cmd_summary(client, days)),
        Command::Prefs {
            tracking,
            gaze,
            tab,
            idle,
            idle_threshold,
            look_away_threshold,
        } => {
            let changes = PrefChanges {
                tracking,
                gaze,
                tab,
                idle,
                idle_threshold,
                look_away_threshold,
            };
            with_client(&config, |client| cmd_prefs(client, &config.tracking, &changes))
        }
        Command::Forget { yes } => {
            if !yes {
                bail!("refusing to delete attention data without --yes");
            }
            with_client(&config, cmd_forget)
        }
    }
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Attention Tracking Configuration");
    println!("================================");
    println!();
    println!("Config file:     {}", Config::config_path().display());
    println!("Log file:        {}", Config::log_path().display());
    println!();

    print_tracking(&config.tracking);
    println!();

    let sync = &config.sync;
    println!("Sync enabled:    {}", sync.enabled);
    if !sync.enabled {
        println!();
        println!("Sync is disabled. Enable it in config.toml:");
        println!();
        println!("  [sync]");
        println!("  enabled = true");
        println!("  server_url = \"https://study.example.com/api\"");
        println!("  api_token = \"xxxxxxxx\"");
        return Ok(());
    }

    println!(
        "Server URL:      {}",
        sync.server_url.as_deref().unwrap_or("<not set>")
    );
    println!(
        "API token:       {}",
        if sync.api_token.is_some() { "<set>" } else { "<not set>" }
    );
    println!("Timeout:         {}s", sync.timeout_secs);
    println!();
    if sync.is_ready() {
        println!("Status: Ready to report");
    } else {
        println!("Status: Not ready (missing required configuration)");
    }

    Ok(())
}

fn print_tracking(tracking: &AttentionConfig) {
    println!("Tab tracking:    {}", tracking.enable_tab_tracking);
    println!("Idle tracking:   {}", tracking.enable_idle_tracking);
    println!("Gaze tracking:   {}", tracking.enable_gaze_tracking);
    println!("Idle threshold:  {}s", tracking.idle_threshold_ms / 1000);
    println!("Look-away:       {}s", tracking.look_away_threshold_ms / 1000);
    println!("Tab grace:       {}ms", tracking.tab_switch_grace_period_ms);
    println!("Report every:    {}s", tracking.report_interval_ms / 1000);
}

/// Run a backend command on a fresh runtime, or explain why it cannot run
fn with_client<F, Fut>(config: &Config, command: F) -> Result<()>
where
    F: FnOnce(MetricsClient) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    if !config.sync.is_ready() {
        println!("Sync is not configured. Run 'attentrack status' for details.");
        return Ok(());
    }

    let client = MetricsClient::new(&config.sync).context("failed to create metrics client")?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(command(client))
}

async fn cmd_analytics(client: MetricsClient, days: u32) -> Result<()> {
    let analytics = client
        .analytics(days)
        .await
        .context("failed to fetch analytics")?;

    println!("Attention analytics, last {} days", days);
    println!();
    println!("Sessions:          {}", analytics.total_sessions);
    println!("Avg focus:         {:.1}", analytics.average_focus_score);
    println!("Avg engagement:    {:.1}", analytics.average_engagement_score);

    if !analytics.peak_hours.is_empty() {
        let hours: Vec<String> = analytics
            .peak_hours
            .iter()
            .map(|h| format!("{:02}:00", h))
            .collect();
        println!("Peak hours:        {}", hours.join(", "));
    }

    if !analytics.trend.is_empty() {
        println!();
        println!("Trend:");
        for point in &analytics.trend {
            println!("  {}  {:>5.1}", point.date, point.focus_score);
        }
    }

    for insight in &analytics.insights {
        println!("- {}", insight);
    }
    Ok(())
}

async fn cmd_summary(client: MetricsClient, days: u32) -> Result<()> {
    let summaries = client
        .daily_summary(days)
        .await
        .context("failed to fetch daily summary")?;

    if summaries.is_empty() {
        println!("No attention data in the last {} days", days);
        return Ok(());
    }

    println!("{:<12} {:>9} {:>9} {:>9} {:>7}", "Date", "Sessions", "Tracked", "Focused", "Focus");
    for day in &summaries {
        println!(
            "{:<12} {:>9} {:>8}m {:>8}m {:>7.1}",
            day.date,
            day.session_count,
            day.total_seconds / 60,
            day.focused_seconds / 60,
            day.average_focus_score
        );
    }
    Ok(())
}

struct PrefChanges {
    tracking: Option<bool>,
    gaze: Option<bool>,
    tab: Option<bool>,
    idle: Option<bool>,
    idle_threshold: Option<u64>,
    look_away_threshold: Option<u64>,
}

impl PrefChanges {
    fn is_empty(&self) -> bool {
        self.tracking.is_none()
            && self.gaze.is_none()
            && self.tab.is_none()
            && self.idle.is_none()
            && self.idle_threshold.is_none()
            && self.look_away_threshold.is_none()
    }

    fn apply(&self, prefs: &mut AttentionPreferences) {
        if let Some(v) = self.tracking {
            prefs.tracking_enabled = v;
        }
        if let Some(v) = self.gaze {
            prefs.gaze_tracking_enabled = v;
        }
        if let Some(v) = self.tab {
            prefs.tab_tracking_enabled = v;
        }
        if let Some(v) = self.idle {
            prefs.idle_tracking_enabled = v;
        }
        if let Some(v) = self.idle_threshold {
            prefs.idle_threshold_seconds = Some(v);
        }
        if let Some(v) = self.look_away_threshold {
            prefs.look_away_threshold_seconds = Some(v);
        }
    }
}

async fn cmd_prefs(
    client: MetricsClient,
    local: &AttentionConfig,
    changes: &PrefChanges,
) -> Result<()> {
    let mut prefs = client
        .preferences()
        .await
        .context("failed to fetch preferences")?;

    if !changes.is_empty() {
        changes.apply(&mut prefs);
        prefs = client
            .update_preferences(&prefs)
            .await
            .context("failed to update preferences")?;
        tracing::info!("Attention preferences updated");
        println!("Preferences updated.");
        println!();
    }

    println!("{}", serde_json::to_string_pretty(&prefs)?);
    println!();
    println!("Effective session configuration:");
    let effective = AttentionConfig::from_preferences(&prefs, local);
    effective
        .validate()
        .context("backend preferences produce an invalid configuration")?;
    print_tracking(&effective);
    Ok(())
}

async fn cmd_forget(client: MetricsClient) -> Result<()> {
    client
        .delete_all_data()
        .await
        .context("failed to delete attention data")?;
    tracing::info!("Attention data deletion requested");
    println!("All attention data deleted.");
    Ok(())
}
