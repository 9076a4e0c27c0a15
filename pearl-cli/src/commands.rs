//! CLI subcommand handlers.

use crate::{Commands, ConfigAction, RunnerAction};
use anyhow::Context;
use pearl_core::config::{PearlConfig, load_config, load_config_file};
use pearl_core::gateway::{AppState, serve};
use pearl_core::providers::create_generator;
use pearl_core::research::{Pipeline, ResearchEngine, RunReport};
use pearl_core::search::create_search_provider;
use pearl_core::store::{BlobStore, LocalStore, MemoryStore, RowStore};
use pearl_core::{AutoRunner, RunnerReport, countries};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_path),
        Commands::Countries { query } => {
            handle_countries(query.as_deref());
            Ok(())
        }
        command => {
            let config = load(workspace, config_path)?;
            match command {
                Commands::Serve {
                    ephemeral,
                    host,
                    port,
                } => handle_serve(config, workspace, ephemeral, host, port).await,
                Commands::Run { code, topic, json } => {
                    handle_run(&config, workspace, &code, topic.as_deref(), json).await
                }
                Commands::Status => handle_status(&config, workspace).await,
                Commands::Runner { action } => handle_runner(action, &config, workspace).await,
                Commands::Config { .. } | Commands::Countries { .. } => Ok(()),
            }
        }
    }
}

fn load(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<PearlConfig> {
    let config = match config_path {
        Some(path) => {
            load_config_file(path).map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?
        }
        None => load_config(Some(workspace), None)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?,
    };
    for warning in config.validate() {
        warn!(warning = warning.as_str(), "Configuration warning");
    }
    Ok(config)
}

fn open_store(config: &PearlConfig, workspace: &Path) -> Arc<LocalStore> {
    let root = config.store.resolve_root(workspace);
    info!(root = %root.display(), "Using local store");
    Arc::new(LocalStore::new(root))
}

fn build_pipeline(config: &PearlConfig, store: Arc<LocalStore>) -> anyhow::Result<Pipeline> {
    let search = create_search_provider(&config.search).context("Search provider unavailable")?;
    let generator = create_generator(&config.llm).context("Text generator unavailable")?;
    let engine = ResearchEngine::new(search, generator, config);
    Ok(Pipeline::new(engine, store.clone(), store, config))
}

async fn handle_serve(
    mut config: PearlConfig,
    workspace: &Path,
    ephemeral: bool,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let (rows, blobs): (Arc<dyn RowStore>, Arc<dyn BlobStore>) = if ephemeral {
        info!("Using in-memory store; nothing will be persisted");
        let store = Arc::new(MemoryStore::new());
        (store.clone(), store)
    } else {
        let store = open_store(&config, workspace);
        (store.clone(), store)
    };

    let state = AppState::from_config(config, rows, blobs);
    serve(state).await.context("API server failed")?;
    Ok(())
}

async fn handle_run(
    config: &PearlConfig,
    workspace: &Path,
    code: &str,
    topic: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config, open_store(config, workspace))?;
    let report = pipeline.run_country(code, topic).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    let subject = report.topic.as_deref().unwrap_or(&report.country);
    println!("Run {} ({})", report.run_id, subject);
    println!(
        "  candidates {}, verified {}, duplicates {}, written {} in {:.1}s",
        report.stats.candidates,
        report.stats.verified,
        report.stats.duplicates,
        report.stats.written,
        report.duration_secs
    );
    if report.shortlist.is_empty() {
        println!("  No new verified ideas.");
        return;
    }
    for (rank, fingerprint) in report.shortlist.iter().enumerate() {
        let Some(idea) = report.ideas.iter().find(|i| &i.fingerprint() == fingerprint) else {
            continue;
        };
        println!(
            "  {}. [{}] {} ({} sources)",
            rank + 1,
            idea.score,
            idea.title,
            idea.sources.len()
        );
        if let Some(saturation) = &idea.saturation {
            println!(
                "     saturation {} ({:?})",
                saturation.saturation_score, saturation.already_common
            );
        }
    }
}

fn handle_countries(query: Option<&str>) {
    let found: Vec<&countries::Country> = match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => countries::search(q),
        None => countries::all().iter().collect(),
    };
    if found.is_empty() {
        println!("No countries match.");
        return;
    }
    for c in found {
        println!("{}  {:<24} {:<24} {}", c.code, c.name_es, c.name_en, c.region);
    }
}

async fn handle_status(config: &PearlConfig, workspace: &Path) -> anyhow::Result<()> {
    let store = open_store(config, workspace);
    let runner = AutoRunner::new(store.clone());
    let report = runner.status().await?;

    println!("Search provider: {}", config.search.provider);
    println!("  key present:   {}", config.search.has_api_key());
    println!("Text generator:  {} ({})", config.llm.provider, config.llm.model);
    println!("  key present:   {}", config.llm.has_api_key());
    println!("Focus market:    {}", config.research.focus_market);
    println!("Store:           {}", store.root().display());
    print_runner(&report);
    Ok(())
}

fn print_runner(report: &RunnerReport) {
    let next = report
        .next_country
        .as_ref()
        .map(|c| format!("{} ({})", c.name, c.code))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Auto-runner:     {} at {}/{}, next {}",
        report.status, report.cursor, report.total, next
    );
}

async fn handle_runner(
    action: RunnerAction,
    config: &PearlConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    let store = open_store(config, workspace);
    let runner = AutoRunner::new(store.clone());

    match action {
        RunnerAction::Status => print_runner(&runner.status().await?),
        RunnerAction::Start { reset } => {
            let state = runner.start(reset).await?;
            println!("Auto-runner {} at cursor {}", state.status, state.cursor_index);
        }
        RunnerAction::Stop => {
            let state = runner.stop().await?;
            println!("Auto-runner {} at cursor {}", state.status, state.cursor_index);
        }
        RunnerAction::Advance {
            failed,
            country,
            expected_cursor,
        } => {
            let cursor = runner
                .advance(!failed, country.as_deref(), expected_cursor)
                .await?;
            println!("Cursor now {cursor}");
        }
        RunnerAction::Step => {
            let pipeline = build_pipeline(config, store)?;
            let outcome = runner.step(&pipeline).await?;
            match (&outcome.report, &outcome.error) {
                (Some(report), _) => print_report(report),
                (None, Some(error)) => println!("Run for {} failed: {error}", outcome.country_code),
                (None, None) => {}
            }
            println!("Cursor now {}", outcome.cursor);
        }
    }
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".pearl");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&PearlConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!("Created default configuration at: {}", config_path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let mut config = load(workspace, config_path)?;
            mask(&mut config.llm.api_key);
            mask(&mut config.search.api_key);
            println!("{}", toml::to_string_pretty(&config)?);
            for warning in config.validate() {
                println!("# warning: {warning}");
            }
            Ok(())
        }
    }
}

fn mask(key: &mut Option<String>) {
    if key.is_some() {
        *key = Some("********".to_string());
    }
}
