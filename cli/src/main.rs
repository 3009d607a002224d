use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use delve_core::agent::{ConversationDriver, Phase, PromptBuilder, ToolRegistry, TurnRequest};
use delve_core::{
    AppState, Config, SharedModel, build_default_registry, config, create_provider, news_tools,
    research_tools,
};
use tracing_subscriber::EnvFilter;

mod observer;

use observer::ConsoleObserver;

#[derive(Parser)]
#[command(name = "delve")]
#[command(about = "delve - streaming deep-research search over a local model", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.delve/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the search page and WebSocket endpoint
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Research a question in the terminal (interactive when no query is given)
    Ask { query: Option<String> },
    /// Summarize current headlines, optionally about a topic
    News { query: Option<String> },
    /// Write a default config file
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("delve=info,delve_core=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    });

    match command {
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(config::get_config_path);
            init_config(&path, force)?;
        }
        Commands::Serve { host, port } => {
            let mut config = Config::load_or_init(cli.config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await?;
        }
        Commands::Ask { query } => {
            let config = Config::load_or_init(cli.config.as_deref())?;
            let session = Terminal::new(&config)?;
            match query {
                Some(query) => session.research(&query).await?,
                None => session.repl().await?,
            }
        }
        Commands::News { query } => {
            let config = Config::load_or_init(cli.config.as_deref())?;
            let session = Terminal::new(&config)?;
            session.news(query.as_deref()).await?;
        }
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            style("!").yellow(),
            path.display()
        );
        return Ok(());
    }

    config::save_config(&Config::default(), path)?;
    println!(
        "{} Wrote default config to {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}

fn shared_model(config: &Config) -> Result<SharedModel> {
    let provider = create_provider(config)?;
    let model = SharedModel::load(provider, config.model.clone(), config.temperature);
    model.spawn_load();
    Ok(model)
}

async fn serve(config: Config) -> Result<()> {
    let model = shared_model(&config)?;
    let tools = Arc::new(build_default_registry(&config)?);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let state = AppState::new(model, tools, config);
    delve_core::serve(listener, state).await
}

/// One-shot turns driven from the terminal instead of a socket.
struct Terminal {
    model: SharedModel,
    tools: Arc<ToolRegistry>,
    language: String,
    max_iterations: usize,
}

impl Terminal {
    fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            model: shared_model(config)?,
            tools: Arc::new(build_default_registry(config)?),
            language: config.language.clone(),
            max_iterations: config.max_iterations,
        })
    }

    fn prompts(&self, tools: &[String]) -> Result<PromptBuilder> {
        let specs = self.tools.specs_for(tools)?;
        Ok(PromptBuilder::new(self.language.clone()).with_tool_specs(specs))
    }

    async fn run(&self, prompts: &PromptBuilder, request: TurnRequest) -> Result<()> {
        let model = self.model.ready().await?;
        let driver = ConversationDriver::new(model, self.tools.clone())
            .with_max_iterations(self.max_iterations)
            .with_system_prompt(prompts.build_system_prompt());

        let mut observer = ConsoleObserver::new();
        observer.begin(Phase::Analysis);
        observer.enter(Phase::WebSearch);

        let summary = driver.run(&request, &mut observer).await?;
        observer.enter(Phase::SummaryGeneration);
        println!();
        tracing::debug!(
            rounds = summary.rounds,
            tool_calls = summary.tool_calls.len(),
            "Turn complete"
        );
        Ok(())
    }

    async fn research(&self, query: &str) -> Result<()> {
        let tools = research_tools();
        let prompts = self.prompts(&tools)?;
        let request = TurnRequest::new(prompts.research_prompt(query), tools);
        self.run(&prompts, request).await
    }

    async fn news(&self, topic: Option<&str>) -> Result<()> {
        let tools = news_tools();
        let prompts = self.prompts(&tools)?;
        let request = TurnRequest::new(prompts.news_prompt(topic), tools);
        self.run(&prompts, request).await
    }

    async fn repl(&self) -> Result<()> {
        println!("{}", style("delve").cyan().bold());
        println!("Type a research question (Ctrl+D to exit):\n");

        let stdin = io::stdin();
        loop {
            print!("> ");
            let _ = io::stdout().flush();

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) | Err(_) => {
                    println!();
                    break;
                }
                Ok(_) => {
                    let input = input.trim();
                    if input.is_empty() {
                        continue;
                    }
                    if let Err(e) = self.research(input).await {
                        eprintln!("{} {}", style("Error:").red().bold(), e);
                    }
                    println!();
                }
            }
        }

        Ok(())
    }
}
