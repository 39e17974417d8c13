use anyhow::{bail, Context};
use browser_autopilot::actions::{Action, AutomationPlan};
use browser_autopilot::plan::{search_prompt, SearchEngine};
use browser_autopilot::{Config, GeminiPlanner, Planner, SessionManager};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "browser-autopilot")]
#[command(about = "Run AI-planned browser automation")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a plan and print the report as JSON
    Run {
        /// Plan file (an AutomationPlan object or a bare list of actions)
        #[arg(long, conflicts_with = "prompt", required_unless_present = "prompt")]
        plan: Option<PathBuf>,

        /// Generate the plan from this instruction first
        #[arg(long)]
        prompt: Option<String>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Print the plan generated for an instruction
    Plan {
        #[arg(long)]
        prompt: String,
    },

    /// Search the web and open a result
    Search {
        #[arg(long)]
        term: String,

        /// google or brave
        #[arg(long, default_value_t = SearchEngine::Google)]
        engine: SearchEngine,

        /// Open the first result on this domain instead of the top one
        #[arg(long)]
        domain: Option<String>,

        #[arg(long)]
        headed: bool,
    },

    /// Open a page and describe it, optionally suggesting next actions
    Inspect {
        #[arg(long)]
        url: String,

        /// Goal to suggest the next actions for
        #[arg(long)]
        goal: Option<String>,

        #[arg(long)]
        headed: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    }
    .with_env_overrides();

    match cli.command {
        Commands::Run {
            plan,
            prompt,
            headed,
        } => {
            let plan = match (plan, prompt) {
                (Some(path), _) => read_plan(&path)?,
                (None, Some(prompt)) => GeminiPlanner::from_config(&config.vision)?
                    .plan(&prompt)
                    .await?,
                (None, None) => bail!("either --plan or --prompt is required"),
            };
            let headless = config.browser.headless && !headed;
            run_plan(config, &plan, headless).await?;
        }
        Commands::Plan { prompt } => {
            let plan = GeminiPlanner::from_config(&config.vision)?
                .plan(&prompt)
                .await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Search {
            term,
            engine,
            domain,
            headed,
        } => {
            let prompt = search_prompt(&term, engine, domain.as_deref());
            let plan = GeminiPlanner::from_config(&config.vision)?
                .plan(&prompt)
                .await?;

            let mut config = config;
            engine.selectors().merge_into(&mut config.execution);
            let headless = config.browser.headless && !headed;
            run_plan(config, &plan, headless).await?;
        }
        Commands::Inspect { url, goal, headed } => {
            let headless = config.browser.headless && !headed;
            let planner = match goal {
                Some(_) => Some(GeminiPlanner::from_config(&config.vision)?),
                None => None,
            };
            let manager = SessionManager::with_chrome(config)?;
            manager.initialize(headless).await?;

            let inspection = inspect(&manager, &url, goal.as_deref(), planner.as_ref()).await;
            manager.close().await;
            println!("{}", serde_json::to_string_pretty(&inspection?)?);
        }
    }

    Ok(())
}

async fn run_plan(config: Config, plan: &AutomationPlan, headless: bool) -> anyhow::Result<()> {
    info!(
        "Running plan \"{}\" with {} actions",
        plan.description,
        plan.actions.len()
    );

    let manager = SessionManager::with_chrome(config)?;
    let report = manager.execute(&plan.actions, headless).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.success {
        bail!(report.error.unwrap_or_else(|| "plan failed".to_string()));
    }
    Ok(())
}

async fn inspect(
    manager: &SessionManager,
    url: &str,
    goal: Option<&str>,
    planner: Option<&GeminiPlanner>,
) -> anyhow::Result<serde_json::Value> {
    manager.navigate(url).await?;
    let page = manager.current_page_info().await?;
    let analysis = manager
        .analyze_current_page(&format!("Inspecting {}", url))
        .await?;

    let suggestions = match (goal, planner) {
        (Some(goal), Some(planner)) => manager.suggest_next_actions(planner, goal).await?,
        _ => Vec::new(),
    };

    Ok(serde_json::json!({
        "page": page,
        "analysis": analysis,
        "suggestions": suggestions,
    }))
}

fn read_plan(path: &Path) -> anyhow::Result<AutomationPlan> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading plan {}", path.display()))?;

    if let Ok(plan) = serde_json::from_str::<AutomationPlan>(&raw) {
        return Ok(plan);
    }
    let actions: Vec<Action> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is neither a plan nor a list of actions", path.display()))?;
    Ok(AutomationPlan {
        description: path.display().to_string(),
        expected_outcome: String::new(),
        actions,
    })
}
