//! Workspace Context CLI
//!
//! Scans a workspace, builds one context for the chosen scope and prints it.

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use workspace_context::config::{Args, Config, OutputFormat};
use workspace_context::context::compose_prompt;
use workspace_context::session::WorkspaceSession;
use workspace_context::types::{
    ContextBuildResult, ContextInclusionState, ContextOutcome, ContextSnapshot,
};
use workspace_context::workspace::{InclusionPreferences, LocalFileSystem};
use workspace_context::VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = Config::from_args(&args)?;

    // Initialize logging
    let log_level = if config.debug { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let root = config.workspace_root()?;

    info!("Workspace Context v{}", VERSION);
    info!("Workspace: {:?}", root);
    info!("Scope: {:?}", config.scope);

    let preferences = load_preferences(&args, &root).await?;
    let fs = Arc::new(LocalFileSystem::new());
    let session = WorkspaceSession::new(
        fs.clone(),
        fs,
        config.boundary.to_filter()?,
        config.pipeline,
    )
    .with_preferences(preferences);

    let snapshot = session
        .open(&root)
        .await
        .with_context(|| format!("Failed to scan workspace {}", root.display()))?;
    info!(
        "Snapshot ready: {} files, hash {}",
        snapshot.file_count(),
        snapshot.snapshot_hash
    );

    if let Some(selection) = &args.select {
        let snapshot = session.select(Some(selection.as_path())).await?;
        if snapshot.selected_path.is_none() {
            warn!("Selection {:?} is not part of the workspace", selection);
        }
    }
    for path in &args.include {
        session
            .set_inclusion(path, ContextInclusionState::Included)
            .await
            .with_context(|| format!("Cannot include {}", path.display()))?;
    }
    for path in &args.exclude {
        session
            .set_inclusion(path, ContextInclusionState::Excluded)
            .await
            .with_context(|| format!("Cannot exclude {}", path.display()))?;
    }

    match session.build_context("cli", config.scope).await? {
        ContextOutcome::NoContext(reason) => {
            println!("No context built: {}", reason);
        }
        ContextOutcome::Built(result) => match args.format {
            OutputFormat::Summary => print_summary(&result),
            OutputFormat::Json => {
                let summary = ContextSnapshot::from(&result);
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            OutputFormat::Prompt => {
                let question = args.question.as_deref().unwrap_or_default();
                print!("{}", compose_prompt(question, &result));
            }
        },
    }

    if config.metrics {
        eprint!("{}", session.metrics().to_prometheus());
    }

    Ok(())
}

async fn load_preferences(args: &Args, root: &Path) -> anyhow::Result<InclusionPreferences> {
    let path = match &args.preferences {
        Some(path) => Some(path.clone()),
        None => {
            let canonical = tokio::fs::canonicalize(root)
                .await
                .unwrap_or_else(|_| root.to_path_buf());
            InclusionPreferences::default_path(&canonical)
        }
    };

    match path {
        Some(path) => Ok(InclusionPreferences::load(&path)
            .await
            .with_context(|| format!("Failed to load preferences {}", path.display()))?),
        None => Ok(InclusionPreferences::new()),
    }
}

fn print_summary(result: &ContextBuildResult) {
    let summary = ContextSnapshot::from(result);
    println!(
        "Attached {} files ({} truncated) in {} segments: {} / {} bytes, {} / {} tokens",
        summary.attached.len() + summary.truncated.len(),
        summary.truncated.len(),
        summary.segment_count,
        summary.total_bytes,
        summary.max_total_bytes,
        summary.total_tokens,
        summary.max_total_tokens
    );
    for file in &summary.attached {
        println!("  + {} ({} bytes, {} tokens)", file.path, file.bytes, file.tokens);
    }
    for file in &summary.truncated {
        println!(
            "  ~ {} ({} bytes, {} tokens): {}",
            file.path,
            file.bytes,
            file.tokens,
            file.note.as_deref().unwrap_or_default()
        );
    }
    for file in &summary.excluded {
        println!(
            "  - {}: {}",
            file.path,
            file.note.as_deref().unwrap_or_default()
        );
    }
    for path in &summary.unreadable {
        println!("  ! {}: unreadable", path);
    }
}
