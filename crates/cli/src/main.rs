use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use events::{EventBus, RunEvent};
use orchestrator::{
    ApprovalResponder, AutoApprover, DeliverableStore, ProjectStore, Team, TemplateSource,
};
use server::{create_router, state::AppState};
use stagegate_core::Stage;

const STAGEGATE_DIR: &str = ".stagegate";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_PORT: u16 = 3001;

#[derive(Parser)]
#[command(name = "stagegate")]
#[command(about = "Stage-gated multi-agent pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP control surface
    Serve {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Create a project from an idea
    Create { name: String, idea: String },
    /// List projects and the stage each has reached
    List,
    /// Run the pipeline for a project, approving on the console
    Run {
        project: String,
        /// Spend ceiling for the run
        #[arg(short, long)]
        investment: Option<f64>,
        /// Stage to resume from (defaults to the saved stage)
        #[arg(long)]
        start: Option<String>,
        /// Stage to reach (defaults to Test)
        #[arg(long)]
        end: Option<String>,
        /// Grant every approval without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Show a project's configuration and deliverables
    Status { project: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct StagegateConfig {
    workspace: PathBuf,
    server: ServerConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServerConfig {
    port: u16,
}

impl Default for StagegateConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("./workspace"),
            server: ServerConfig { port: DEFAULT_PORT },
        }
    }
}

impl StagegateConfig {
    async fn load() -> Result<Self> {
        let path = std::env::current_dir()?
            .join(STAGEGATE_DIR)
            .join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Asks yes/no questions on the terminal.
struct ConsoleResponder;

#[async_trait]
impl ApprovalResponder for ConsoleResponder {
    async fn verdict(&self, _stage: Stage, prompt: &str) -> orchestrator::Result<bool> {
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            print!("{prompt} ");
            std::io::stdout().flush().ok();
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|_| orchestrator::OrchestratorError::ApprovalChannelClosed)??;

        let answer = answer.trim().to_lowercase();
        Ok(matches!(answer.as_str(), "y" | "yes"))
    }
}

fn parse_stage(value: &str) -> Result<Stage> {
    // Accept both "Design" and "design".
    let mut capitalized = value.to_lowercase();
    if let Some(first) = capitalized.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    capitalized
        .parse::<Stage>()
        .context("expected one of Requirements, Design, Plan, Build, Test")
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = StagegateConfig::load().await?;

    match cli.command {
        Some(Commands::Serve { port }) => serve(&config, port).await,
        Some(Commands::Create { name, idea }) => create(&config, &name, &idea).await,
        Some(Commands::List) => list(&config).await,
        Some(Commands::Run {
            project,
            investment,
            start,
            end,
            yes,
        }) => run(&config, &project, investment, start, end, yes).await,
        Some(Commands::Status { project }) => status(&config, &project).await,
        None => serve(&config, cli.port).await,
    }
}

async fn serve(config: &StagegateConfig, port: u16) -> Result<()> {
    let port = if port != DEFAULT_PORT {
        port
    } else {
        config.server.port
    };
    let state = AppState::new(&config.workspace);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    println!("Listening on http://{}", listener.local_addr()?);
    println!("Workspace: {}", config.workspace.display());
    axum::serve(listener, app).await?;
    Ok(())
}

async fn create(config: &StagegateConfig, name: &str, idea: &str) -> Result<()> {
    let store = ProjectStore::new(&config.workspace);
    store.create(name, idea).await?;
    println!("Created project '{name}'");
    Ok(())
}

async fn list(config: &StagegateConfig) -> Result<()> {
    let store = ProjectStore::new(&config.workspace);
    let projects = store.list().await?;
    if projects.is_empty() {
        println!("No projects in {}", config.workspace.display());
        return Ok(());
    }
    for project in projects {
        println!("{:<24} {:<12} {}", project.name, project.stage, project.idea);
    }
    Ok(())
}

async fn run(
    config: &StagegateConfig,
    project: &str,
    investment: Option<f64>,
    start: Option<String>,
    end: Option<String>,
    yes: bool,
) -> Result<()> {
    let store = ProjectStore::new(&config.workspace);
    let saved = store.load(project).await?;
    let start = match start {
        Some(s) => parse_stage(&s)?,
        None => saved.stage,
    };
    let end = match end {
        Some(s) => parse_stage(&s)?,
        None => Stage::Test,
    };

    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(envelope) = rx.recv().await {
            match envelope.event {
                RunEvent::Log { line, .. } => println!("  {line}"),
                RunEvent::StageChanged { stage, .. } => println!("== stage: {stage} =="),
                _ => {}
            }
        }
    });

    let responder: Arc<dyn ApprovalResponder> = if yes {
        Arc::new(AutoApprover)
    } else {
        Arc::new(ConsoleResponder)
    };

    let mut team = Team::new(project, store, responder, Arc::new(TemplateSource), bus).await?;
    if let Some(investment) = investment {
        team.invest(investment);
    }

    println!("Running '{project}' from {start} to {end}");
    let result = team.run(start, end).await;
    printer.abort();

    match result {
        Ok(stage) => {
            println!("Run completed at stage {stage}");
            println!("Spent: {:.2}", team.ledger().spent());
            Ok(())
        }
        Err(e) => bail!("run failed: {e}"),
    }
}

async fn status(config: &StagegateConfig, project: &str) -> Result<()> {
    let store = ProjectStore::new(&config.workspace);
    let saved = store.load(project).await?;
    println!("Project:  {project}");
    println!("Idea:     {}", saved.idea);
    println!("Stage:    {}", saved.stage);

    let deliverables = DeliverableStore::new(store.project_dir(project));
    for stage in Stage::ALL {
        let Ok(path) = deliverables.path(stage) else {
            continue;
        };
        let marker = if path.exists() { "x" } else { " " };
        println!(
            "  [{marker}] {:<14} {}",
            stage.to_string(),
            path.file_name().and_then(|f| f.to_str()).unwrap_or("")
        );
    }
    Ok(())
}
