use delve::app::{build_exporter, build_ingestor, build_research_agent};
use delve::cli::{Cli, Commands, ConfigAction};
use delve::config::Config;
use delve::error::{DelveError, Result};
use delve::export::{answer_filename, ResearchExporter};
use delve::research::ResearchAgent;
use delve::server::{self, IpcClient, IpcRequest, IpcResponse, ResearchServer, StopOutcome};
use delve::session::ResearchSession;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

fn main() {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Chat => cmd_chat(load_config(cli.config, cli.profile)?),
        Commands::Ask {
            query,
            deep,
            refine,
            export,
        } => cmd_ask(load_config(cli.config, cli.profile)?, &query, deep, refine, export),
        Commands::Ingest { dir } => cmd_ingest(load_config(cli.config, cli.profile)?, dir),
        Commands::Export => cmd_export(load_config(cli.config, cli.profile)?),
        Commands::Serve { detach } => cmd_serve(load_config(cli.config, cli.profile)?, detach),
        Commands::Stop => cmd_stop(load_config(cli.config, cli.profile)?),
        Commands::Status => cmd_status(load_config(cli.config, cli.profile)?),
        Commands::Send { query } => cmd_send(load_config(cli.config, cli.profile)?, query),
        Commands::Config { action } => cmd_config(cli.config, cli.profile, action),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "delve=debug" } else { "delve=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_chat(config: Config) -> Result<()> {
    println!("Setting up the research agent...");
    let agent = build_research_agent(&config)?;
    let exporter = build_exporter(&config)?;
    let mut session = ResearchSession::new(agent.mode().to_string());

    println!("\n{}", "=".repeat(60));
    println!("Delve research agent ready ({} mode)", agent.mode());
    println!("\nCommands:");
    println!("  <question>       research a question");
    println!("  deep <question>  multi-step analysis");
    println!("  refine <query>   follow-up suggestions");
    println!("  export           save the session as JSON");
    println!("  quit | exit | q  save the session and leave");
    println!("{}\n", "=".repeat(60));

    loop {
        let Some(input) = prompt("Research Query: ")? else {
            // Ctrl-D
            println!();
            finish_session(&exporter, &mut session);
            break;
        };

        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            finish_session(&exporter, &mut session);
            break;
        }

        if input.is_empty() {
            println!("Please enter a research question.");
            continue;
        }

        if input.to_lowercase().starts_with("export") {
            match export_session(&exporter, &mut session) {
                Ok(path) => println!("✓ Research session exported to: {}", path.display()),
                Err(e) => println!("✗ Export failed: {}", e),
            }
            continue;
        }

        println!("\nAnalyzing and researching...");
        let response = answer(agent.as_ref(), &mut session, &input);
        println!("\nResearch Results:\n{}", response);

        let choice = prompt("\nExport this research? (y/n): ")?.unwrap_or_default();
        if matches!(choice.to_lowercase().as_str(), "y" | "yes") {
            match exporter.export_to_markdown(&response, Some(&answer_filename(&input))) {
                Ok(path) => {
                    session.record_export(&path, "markdown");
                    println!("✓ Research exported to: {}", path.display());
                }
                Err(e) => println!("⚠ Export failed: {}", e),
            }
        }

        println!("\n{}\n", "-".repeat(50));
    }

    Ok(())
}

/// Run one query through the agent and log it in the session
fn answer(agent: &dyn ResearchAgent, session: &mut ResearchSession, query: &str) -> String {
    let started = Instant::now();
    let response = agent.chat(query);
    session.record(query, &response, started);
    response
}

fn export_session(exporter: &ResearchExporter, session: &mut ResearchSession) -> Result<PathBuf> {
    let path = exporter.export_to_json(&*session, None)?;
    session.record_export(&path, "json");
    Ok(path)
}

fn finish_session(exporter: &ResearchExporter, session: &mut ResearchSession) {
    println!("Exporting final research session...");
    match export_session(exporter, session) {
        Ok(path) => println!("✓ Session exported to: {}", path.display()),
        Err(e) => println!("⚠ Export failed: {}", e),
    }
}

/// Print `label` and read one trimmed line; `None` at end of input
fn prompt(label: &str) -> Result<Option<String>> {
    print!("{}", label);
    std::io::stdout().flush().ok();

    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| DelveError::Io {
            source: e,
            context: "Failed to read from stdin".to_string(),
        })?;

    if read == 0 {
        Ok(None)
    } else {
        Ok(Some(line.trim().to_string()))
    }
}

fn cmd_ask(config: Config, query: &str, deep: bool, refine: bool, export: bool) -> Result<()> {
    let agent = build_research_agent(&config)?;

    let message = if deep {
        format!("deep {}", query)
    } else if refine {
        format!("refine {}", query)
    } else {
        query.to_string()
    };

    let response = agent.chat(&message);
    println!("{}", response);

    if export {
        let exporter = build_exporter(&config)?;
        let path = exporter.export_to_markdown(&response, Some(&answer_filename(query)))?;
        println!("\n✓ Research exported to: {}", path.display());
    }

    Ok(())
}

fn cmd_ingest(config: Config, dir: PathBuf) -> Result<()> {
    println!("Ingesting documents from {}...", dir.display());

    let mut ingestor = build_ingestor(&config)?;
    let report = ingestor.ingest_dir(&dir)?;

    println!("✓ Ingestion complete");
    println!("  Files indexed:     {}", report.files_indexed);
    println!("  Files unchanged:   {}", report.files_unchanged);
    println!("  Files skipped:     {}", report.files_skipped);
    println!("  Passages added:    {}", report.passages_added);
    println!("  Passages embedded: {}", report.passages_embedded);

    Ok(())
}

fn cmd_serve(config: Config, detach: bool) -> Result<()> {
    let server = ResearchServer::new(config);

    if detach {
        println!("✓ Starting research server in the background...");
        // Only the forked child returns from here
        return server.start_detached();
    }

    let runtime = tokio::runtime::Runtime::new().map_err(|e| DelveError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    runtime.block_on(server.run_foreground())
}

fn cmd_stop(config: Config) -> Result<()> {
    let pm = server::process_manager(&config);
    if !pm.is_running() {
        println!("Research server is not running");
        return Ok(());
    }

    println!("Stopping research server...");
    match pm.stop()? {
        StopOutcome::NotRunning => println!("Research server is not running"),
        StopOutcome::Graceful => println!("✓ Research server stopped gracefully"),
        StopOutcome::Killed => println!("✓ Research server force killed"),
        StopOutcome::Unresponsive => {
            println!("⚠ Warning: Research server may still be running (PID file stale)")
        }
    }

    Ok(())
}

fn cmd_status(config: Config) -> Result<()> {
    let pm = server::process_manager(&config);

    println!("Delve Status");
    println!("============");

    if !pm.is_running() {
        println!("\nServer: Stopped");
        return Ok(());
    }

    match pm.read_pid() {
        Ok(pid) => println!("\nServer: Running (PID: {})", pid),
        Err(_) => println!("\nServer: Running"),
    }

    let response = request(&config, IpcRequest::Status)?;
    if let Some(data) = response.data {
        println!("  Agent ready:    {}", data["agent_ready"]);
        println!("  Mode:           {}", data["mode"].as_str().unwrap_or("-"));
        println!("  Session active: {}", data["session_active"]);
        println!("  Exporter ready: {}", data["exporter_ready"]);
        println!("  Queries:        {}", data["queries"]);
    }

    Ok(())
}

fn cmd_send(config: Config, query: String) -> Result<()> {
    let response = into_data(request(&config, IpcRequest::Research { query })?)?;
    println!("{}", response["response"].as_str().unwrap_or_default());
    Ok(())
}

fn cmd_export(config: Config) -> Result<()> {
    let data = into_data(request(&config, IpcRequest::Export)?)?;
    println!(
        "✓ Research session exported to: {}",
        data["path"].as_str().unwrap_or_default()
    );
    Ok(())
}

/// Send one request to the running server
fn request(config: &Config, request: IpcRequest) -> Result<IpcResponse> {
    let client = IpcClient::new(server::socket_path(config));

    let runtime = tokio::runtime::Runtime::new().map_err(|e| DelveError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;
    runtime.block_on(client.send(&request))
}

fn into_data(response: IpcResponse) -> Result<serde_json::Value> {
    if response.success {
        Ok(response.data.unwrap_or_default())
    } else {
        let kind = response
            .kind
            .map(|k| format!("{:?}", k))
            .unwrap_or_else(|| "Error".to_string());
        Err(DelveError::Server(format!(
            "{}: {}",
            kind,
            response.message.unwrap_or_default()
        )))
    }
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DelveError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'delve config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        return Ok(config);
    }

    match profile {
        Some(profile) => Config::load_with_profile(&path, &profile),
        None => Config::load(&path),
    }
}
