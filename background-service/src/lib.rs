pub mod fetcher;

pub use fetcher::Fetcher;

use database::Database;
use std::sync::Arc;
use std::time::Duration;
use subwatch_core::{CoreError, ErrorExt, ErrorReporter};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Runs the fetcher on the interval stored in the monitor config.
pub struct BackgroundService {
    fetcher: Arc<Fetcher>,
    database: Database,
    shutdown: watch::Sender<bool>,
    reporter: ErrorReporter,
}

impl BackgroundService {
    pub fn new(fetcher: Arc<Fetcher>, database: Database) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            fetcher,
            database,
            shutdown,
            reporter: ErrorReporter::new(),
        }
    }

    /// Spawns the polling loop. The interval is re-read before every sleep.
    pub fn start(&self) -> JoinHandle<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let database = self.database.clone();
        let reporter = self.reporter;
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            info!("Background polling started");
            loop {
                let interval = match database.get_config().await {
                    Ok(config) => polling_interval(config.check_frequency),
                    Err(e) => {
                        reporter.report_error(&e);
                        polling_interval(subwatch_core::MonitorConfig::default().check_frequency)
                    }
                };
                info!(minutes = interval.as_secs() / 60, "Next fetch scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }

                poll_reddit(&fetcher, &reporter).await;
            }
            info!("Background polling stopped");
        })
    }

    pub fn stop(&self) {
        if self.shutdown.send(true).is_err() {
            warn!("Background polling was not running");
        }
    }
}

/// `check_frequency` is in hours.
fn polling_interval(check_frequency: f64) -> Duration {
    Duration::from_secs_f64(check_frequency.max(0.0) * 3600.0)
}

async fn poll_reddit(fetcher: &Fetcher, reporter: &ErrorReporter) {
    match fetcher.run().await {
        Ok(summary) => {
            for error in &summary.errors {
                warn!(error = %error, "Scheduled fetch item failed");
            }
        }
        // No active subreddits is an expected idle state.
        Err(CoreError::InvalidInput { message }) => info!(%message, "Scheduled fetch skipped"),
        Err(e) if e.is_upstream() => reporter.report_warning(&e),
        Err(e) => reporter.report_error(&e),
    }
}
