use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::resolver::Limits;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "screen-script.yaml";

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "screen-script",
    version,
    about = "Resolve UI elements and run automation scripts against a live screen"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Ollama API endpoint for model-backed locating
    #[arg(long, global = true)]
    pub ollama_endpoint: Option<String>,

    /// Ollama model name
    #[arg(long, global = true)]
    pub ollama_model: Option<String>,

    /// Path to config file (default: screen-script.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a script against a device session
    Run {
        /// Locator document (JSON or YAML)
        #[arg(long)]
        doc: PathBuf,

        /// Script source file
        #[arg(long)]
        script: PathBuf,

        /// Replay log output (JSON lines)
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Error report output, written when the run fails
        #[arg(long)]
        report: Option<PathBuf>,

        /// Never follow dependency paths
        #[arg(long)]
        no_dependency: bool,

        /// Device driver program (overrides the config file)
        #[arg(long)]
        driver: Option<String>,

        /// Extra arguments for the driver program
        #[arg(long = "driver-arg")]
        driver_args: Vec<String>,
    },

    /// Compile a script and print the compiled code with its line map
    Compile {
        #[arg(long)]
        script: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Classify a captured snapshot against a locator document
    Classify {
        #[arg(long)]
        doc: PathBuf,

        /// Node records (JSON array or snapshot object)
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Merge fingerprints of several snapshots of one screen
    Skeleton {
        #[arg(long = "snapshot", required = true)]
        snapshots: Vec<PathBuf>,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `screen-script.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_driver")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            program: default_driver(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub model: Option<String>,
}

fn default_driver() -> String { "device-driver".to_string() }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = Path::new(path.unwrap_or(DEFAULT_CONFIG_FILE));
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %config_path.display(), error = %e, "malformed config, using defaults");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}
