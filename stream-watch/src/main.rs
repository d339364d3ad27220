use anyhow::{Context, Result};
use clap::Parser;
use notification_stream::logging::{self, LogFormat, LoggingConfig};
use notification_stream::{
    Notification, NotificationHandler, NotificationStreamManager, RegisteredController,
    StreamCategory,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Notification stream watcher
///
/// Opens the notification streams of one controller, prints every
/// notification received and keeps the streams alive until Ctrl-C.
#[derive(Parser, Debug)]
#[command(name = "stream-watch")]
#[command(about = "Watch the notification streams of a network controller")]
#[command(version)]
pub struct Args {
    /// Stream URL. A `{category}` placeholder is replaced by the lower-case
    /// category name; without it every category uses the same URL.
    #[arg(short, long)]
    pub url: String,

    /// Controller name
    #[arg(short, long)]
    pub name: String,

    /// Controller release
    #[arg(short, long)]
    pub release: String,

    /// User for basic authentication
    #[arg(long)]
    pub user: Option<String>,

    /// Password for basic authentication
    #[arg(long)]
    pub password: Option<String>,

    /// Category to watch; may be repeated. Defaults to all three.
    #[arg(short, long = "category", value_name = "CATEGORY")]
    pub categories: Vec<StreamCategory>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format (compact, pretty, json)
    #[arg(long, default_value = "compact")]
    pub log_format: LogFormat,

    /// Seconds between registry snapshots
    #[arg(short = 's', long, default_value = "30")]
    pub status_interval: u64,

    /// Print notifications and snapshots as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.release.is_empty() {
            return Err(anyhow::anyhow!("Controller name and release must not be empty"));
        }

        if self.user.is_none() || self.password.is_none() {
            return Err(anyhow::anyhow!(
                "Credentials missing: pass --user/--password or set STREAM_WATCH_USER/STREAM_WATCH_PASSWORD"
            ));
        }

        if self.status_interval == 0 {
            return Err(anyhow::anyhow!("Status interval must be positive"));
        }

        LoggingConfig::new(&self.log_level)?;

        Ok(())
    }
}

/// Configuration derived from command line arguments and environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub controller: RegisteredController,
    pub user: String,
    pub password: String,
    pub categories: Vec<StreamCategory>,
    pub logging: LoggingConfig,
    pub status_interval: Duration,
    pub json: bool,
}

impl Config {
    /// Create configuration from command line arguments and environment variables
    pub fn from_env() -> Result<Self> {
        let mut args = Args::parse();

        if args.user.is_none() {
            args.user = std::env::var("STREAM_WATCH_USER").ok();
        }

        if args.password.is_none() {
            args.password = std::env::var("STREAM_WATCH_PASSWORD").ok();
        }

        if let Ok(interval) = std::env::var("STREAM_WATCH_STATUS_INTERVAL") {
            args.status_interval = interval
                .parse()
                .context("Invalid STREAM_WATCH_STATUS_INTERVAL environment variable")?;
        }

        Config::try_from(args)
    }

    /// URL of the stream for `category`
    pub fn stream_url(&self, category: StreamCategory) -> String {
        self.url
            .replace("{category}", &category.as_str().to_lowercase())
    }

    pub fn print_summary(&self) {
        info!("Configuration:");
        info!("  URL: {}", self.url);
        info!("  Controller: {}", self.controller);
        info!("  User: {}", self.user);
        info!(
            "  Categories: {}",
            self.categories
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        info!("  Status interval: {}s", self.status_interval.as_secs());
    }
}

impl TryFrom<Args> for Config {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        args.validate()?;

        let logging = LoggingConfig::new(&args.log_level)?.with_format(args.log_format);
        let categories = if args.categories.is_empty() {
            StreamCategory::ALL.to_vec()
        } else {
            args.categories
        };

        Ok(Self {
            url: args.url,
            controller: RegisteredController::new(args.name, args.release),
            user: args.user.unwrap_or_default(),
            password: args.password.unwrap_or_default(),
            categories,
            logging,
            status_interval: Duration::from_secs(args.status_interval),
            json: args.json,
        })
    }
}

fn printer(json: bool) -> Arc<dyn NotificationHandler> {
    Arc::new(move |n: &Notification| {
        if json {
            let line = serde_json::json!({
                "controller": n.controller_name,
                "release": n.controller_release,
                "category": n.category,
                "url": n.source_url,
                "payload": n.payload,
            });
            println!("{}", line);
        } else {
            println!(
                "[{}-{} {}] {}",
                n.controller_name, n.controller_release, n.category, n.payload
            );
        }
    })
}

fn log_status(manager: &NotificationStreamManager, json: bool) {
    let elements = manager.get_all_elements();
    let pending = manager.pending_reconnects();

    if json {
        match serde_json::to_string(&elements) {
            Ok(snapshot) => info!(pending = pending.len(), "Streams: {}", snapshot),
            Err(e) => error!("Could not serialize stream snapshot: {}", e),
        }
        return;
    }

    info!(streams = elements.len(), pending = pending.len(), "Stream status");
    for element in &elements {
        info!(
            "  {} {} events={} url={}",
            element.session_id, element.key, element.counter, element.url
        );
    }
    for key in &pending {
        info!("  {} waiting to reconnect", key);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    logging::init_logging(&config.logging).context("Failed to initialize logging")?;
    config.print_summary();

    let manager =
        NotificationStreamManager::new().context("Failed to create notification stream manager")?;
    let handler = printer(config.json);

    for category in &config.categories {
        let url = config.stream_url(*category);
        manager
            .start_stream(
                &url,
                &config.controller,
                Arc::clone(&handler),
                *category,
                &config.user,
                &config.password,
            )
            .with_context(|| format!("Failed to start {} stream at {}", category, url))?;
    }

    let mut status = tokio::time::interval(config.status_interval);
    status.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = status.tick() => log_status(&manager, config.json),
        }
    }

    info!("Shutting down");
    manager
        .remove_all_streams_for_controller(&config.controller.name, &config.controller.release)
        .await;
    manager.shutdown().await;

    Ok(())
}
