use anyhow::{Context, Result};
use background_service::{BackgroundService, Fetcher};
use clap::{Parser, Subcommand};
use database::Database;
use gui::App;
use iced::{Application, Settings};
use llm_interface::{LlmProvider, OpenAiProvider};
use reddit_client::{ContentSource, RedditClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use subwatch_core::{AppSettings, ErrorExt};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "subwatch=info,api=info,background_service=info,database=info,reddit_client=info,llm_interface=info,gui=info";

#[derive(Parser)]
#[command(author, version, about = "Monitor subreddits and triage posts scored by an LLM")]
struct Args {
    /// TOML settings file (falls back to $SUBWATCH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API and the scheduled fetcher
    Serve {
        /// Override the bind address from the settings
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Do not run scheduled fetches
        #[arg(long)]
        no_scheduler: bool,
    },
    /// Run one fetch and print the summary as JSON
    Fetch,
    /// Open the desktop dashboard against a running API
    Dashboard {
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        api_url: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    match args.command.unwrap_or(Command::Serve {
        bind: None,
        no_scheduler: false,
    }) {
        Command::Dashboard { api_url } => run_dashboard(api_url),
        command => {
            let settings = AppSettings::load(args.config.as_deref())?;
            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            match command {
                Command::Serve { bind, no_scheduler } => {
                    runtime.block_on(serve(settings, bind, no_scheduler))
                }
                _ => runtime.block_on(fetch_once(settings)),
            }
        }
    }
}

/// Builds the fetcher. Missing credentials are logged and surface later as
/// "client not initialized" when a fetch is attempted.
fn build_fetcher(settings: &AppSettings, database: Database) -> Fetcher {
    let source: Result<Arc<dyn ContentSource>, String> =
        match RedditClient::from_env(&settings.reddit.user_agent) {
            Ok(client) => Ok(Arc::new(client)),
            Err(e) => {
                e.log_warn();
                tracing::warn!(
                    "Reddit client unavailable, fetches will fail until credentials are set"
                );
                Err(e.to_string())
            }
        };

    let analyzer: Result<Arc<dyn LlmProvider>, String> =
        match OpenAiProvider::from_env(&settings.llm) {
            Ok(provider) => Ok(Arc::new(provider)),
            Err(e) => {
                e.log_warn();
                tracing::warn!(
                    "OpenAI client unavailable, fetches will fail until OPENAI_API_KEY is set"
                );
                Err(e.to_string())
            }
        };

    Fetcher::new(database, source, analyzer, settings.fetch.batch_size)
}

async fn serve(settings: AppSettings, bind: Option<SocketAddr>, no_scheduler: bool) -> Result<()> {
    tracing::info!("Starting subwatch");

    let database = Database::open(&settings.database).await?;
    let fetcher = Arc::new(build_fetcher(&settings, database.clone()));

    let scheduler = (settings.scheduler.enabled && !no_scheduler).then(|| {
        let service = BackgroundService::new(Arc::clone(&fetcher), database.clone());
        let handle = service.start();
        (service, handle)
    });

    let state = api::AppState {
        database: database.clone(),
        fetcher,
        verdict_kind: settings.llm.verdict_kind,
    };
    let addr = bind.unwrap_or(settings.server.bind);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    api::serve(listener, state, shutdown_signal()).await?;

    if let Some((service, handle)) = scheduler {
        service.stop();
        if let Err(e) = handle.await {
            tracing::error!("Background polling task failed: {}", e);
        }
    }
    database.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn fetch_once(settings: AppSettings) -> Result<()> {
    let database = Database::open(&settings.database).await?;
    let fetcher = build_fetcher(&settings, database.clone());

    let summary = fetcher.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    database.close().await;

    if summary.has_errors() {
        anyhow::bail!("fetch finished with {} errors", summary.errors.len());
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

fn run_dashboard(api_url: String) -> Result<()> {
    tracing::info!("Starting subwatch dashboard");

    let settings = Settings {
        window: iced::window::Settings {
            size: iced::Size::new(1200.0, 800.0),
            min_size: Some(iced::Size::new(800.0, 600.0)),
            ..Default::default()
        },
        ..Settings::with_flags(api_url)
    };

    DashboardApp::run(settings).map_err(|e| {
        tracing::error!("Application error: {}", e);
        anyhow::anyhow!("GUI error: {e}")
    })
}

struct DashboardApp {
    app: App,
}

impl Application for DashboardApp {
    type Message = gui::Message;
    type Theme = iced::Theme;
    type Executor = iced::executor::Default;
    type Flags = String;

    fn new(api_url: Self::Flags) -> (Self, iced::Command<Self::Message>) {
        let (app, command) = App::new(api_url);
        (Self { app }, command)
    }

    fn title(&self) -> String {
        self.app.title()
    }

    fn update(&mut self, message: Self::Message) -> iced::Command<Self::Message> {
        self.app.update(message)
    }

    fn view(&self) -> iced::Element<Self::Message> {
        self.app.view()
    }
}
