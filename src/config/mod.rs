//! Configuration management for workspace context builds.
//!
//! Values come from an optional YAML file and are then overridden by
//! command-line flags (which themselves fall back to `WORKSPACE_CONTEXT_*`
//! environment variables).

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::context::pipeline::PipelineOptions;
use crate::error::{Error, Result};
use crate::types::{ContextScope, LimitPolicy};
use crate::workspace::boundary::BoundaryFilter;

/// Command-line arguments for the context builder.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "workspace-context")]
#[command(author = "Workspace Context Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build deterministic, budgeted file context for an AI coding assistant")]
pub struct Args {
    /// Workspace root directory
    #[arg(short, long, env = "WORKSPACE_CONTEXT_ROOT")]
    pub workspace: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, env = "WORKSPACE_CONTEXT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Which files are candidates
    #[arg(short, long, value_enum, env = "WORKSPACE_CONTEXT_SCOPE")]
    pub scope: Option<ContextScope>,

    /// Selected file (absolute or relative to the workspace)
    #[arg(long)]
    pub select: Option<PathBuf>,

    /// Mark a file as included (manual scope)
    #[arg(long = "include")]
    pub include: Vec<PathBuf>,

    /// Mark a file as excluded (manual scope)
    #[arg(long = "exclude")]
    pub exclude: Vec<PathBuf>,

    /// Extra glob pattern to keep out of the snapshot
    #[arg(long = "ignore")]
    pub ignore: Vec<String>,

    /// Inclusion preferences file (JSON)
    #[arg(long, env = "WORKSPACE_CONTEXT_PREFERENCES")]
    pub preferences: Option<PathBuf>,

    /// Question placed above the context in prompt output
    #[arg(short, long)]
    pub question: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    pub format: OutputFormat,

    /// Maximum bytes per file
    #[arg(long, env = "WORKSPACE_CONTEXT_MAX_BYTES_PER_FILE")]
    pub max_bytes_per_file: Option<usize>,

    /// Maximum estimated tokens per file
    #[arg(long, env = "WORKSPACE_CONTEXT_MAX_TOKENS_PER_FILE")]
    pub max_tokens_per_file: Option<usize>,

    /// Maximum bytes across all files
    #[arg(long, env = "WORKSPACE_CONTEXT_MAX_TOTAL_BYTES")]
    pub max_total_bytes: Option<usize>,

    /// Maximum estimated tokens across all files
    #[arg(long, env = "WORKSPACE_CONTEXT_MAX_TOTAL_TOKENS")]
    pub max_total_tokens: Option<usize>,

    /// Maximum estimated tokens per segment
    #[arg(long, env = "WORKSPACE_CONTEXT_MAX_TOKENS_PER_SEGMENT")]
    pub max_tokens_per_segment: Option<usize>,

    /// Maximum bytes per segment
    #[arg(long, env = "WORKSPACE_CONTEXT_MAX_BYTES_PER_SEGMENT")]
    pub max_bytes_per_segment: Option<usize>,

    /// Truncate oversized files instead of excluding them
    #[arg(long, env = "WORKSPACE_CONTEXT_TRUNCATE")]
    pub truncate: bool,

    /// Enable debug logging
    #[arg(short, long, env = "WORKSPACE_CONTEXT_DEBUG")]
    pub debug: bool,

    /// Print build counters to stderr when done
    #[arg(long, env = "WORKSPACE_CONTEXT_METRICS")]
    pub metrics: bool,
}

/// How the CLI prints a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable counts and reasons
    #[default]
    Summary,
    /// `ContextSnapshot` as JSON
    Json,
    /// The prompt that would be sent to the assistant
    Prompt,
}

/// Boundary additions on top of the default exclusion set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    /// Extra path component names to exclude
    #[serde(default)]
    pub components: Vec<String>,
    /// Glob patterns matched against root-relative paths
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl BoundaryConfig {
    pub fn to_filter(&self) -> Result<BoundaryFilter> {
        BoundaryFilter::new()
            .with_components(self.components.iter().cloned())
            .with_patterns(&self.patterns)
    }
}

/// Resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Workspace root directory
    #[serde(default)]
    pub workspace: Option<PathBuf>,
    /// Scope used when none is given
    #[serde(default)]
    pub scope: ContextScope,
    /// Budget, truncation, segment limits and read concurrency
    #[serde(default)]
    pub pipeline: PipelineOptions,
    /// Boundary additions
    #[serde(default)]
    pub boundary: BoundaryConfig,
    /// Debug mode
    #[serde(default)]
    pub debug: bool,
    /// Metrics output
    #[serde(default)]
    pub metrics: bool,
}

impl Config {
    /// Load a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Build the effective configuration: file first, then flag overrides.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if args.workspace.is_some() {
            config.workspace = args.workspace.clone();
        }
        if let Some(scope) = args.scope {
            config.scope = scope;
        }

        let budget = &mut config.pipeline.budget;
        override_with(&mut budget.max_bytes_per_file, args.max_bytes_per_file);
        override_with(&mut budget.max_tokens_per_file, args.max_tokens_per_file);
        override_with(&mut budget.max_total_bytes, args.max_total_bytes);
        override_with(&mut budget.max_total_tokens, args.max_total_tokens);

        let segments = &mut config.pipeline.segments;
        override_with(&mut segments.max_tokens_per_segment, args.max_tokens_per_segment);
        override_with(&mut segments.max_bytes_per_segment, args.max_bytes_per_segment);

        if args.truncate {
            config.pipeline.truncation.per_file_bytes = LimitPolicy::Truncate;
            config.pipeline.truncation.per_file_tokens = LimitPolicy::Truncate;
        }

        config.boundary.patterns.extend(args.ignore.iter().cloned());
        config.debug |= args.debug;
        config.metrics |= args.metrics;

        config.validate()?;
        Ok(config)
    }

    /// Workspace root, defaulting to the current directory.
    pub fn workspace_root(&self) -> Result<PathBuf> {
        match &self.workspace {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    fn validate(&self) -> Result<()> {
        let segments = &self.pipeline.segments;
        if segments.max_tokens_per_segment == 0 || segments.max_bytes_per_segment == 0 {
            return Err(Error::Config(
                "segment limits must be greater than zero".to_string(),
            ));
        }
        if self.pipeline.max_concurrent_reads == 0 {
            return Err(Error::Config(
                "max_concurrent_reads must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn override_with(target: &mut usize, value: Option<usize>) {
    if let Some(value) = value {
        *target = value;
    }
}
