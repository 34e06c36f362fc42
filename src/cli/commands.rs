use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::config::AppConfig;
use crate::device::{DeviceSession, DeviceSnapshot};
use crate::document::load_document;
use crate::resolver::context::screen_of_tree;
use crate::resolver::{LocatorModel, OllamaLocator};
use crate::script::{RuntimeOptions, compile, execute};
use crate::skeleton::{Fingerprint, merge_samples, rank};
use crate::tree::{NodeRecord, UiTree, build};

// ============================================================================
// run subcommand
// ============================================================================

/// Where `cmd_run` reads and writes.
#[derive(Debug, Clone, Default)]
pub struct RunPaths {
    pub doc: PathBuf,
    pub script: PathBuf,
    pub trace: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

/// Run a script against a fresh device session and return whether it completed.
pub fn cmd_run(
    paths: &RunPaths,
    no_dependency: bool,
    driver: Option<&str>,
    driver_args: &[String],
    config: &AppConfig,
    ollama_endpoint: Option<&str>,
    ollama_model: Option<&str>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let document = load_document(&paths.doc)?;
    let source = std::fs::read_to_string(&paths.script)?;
    let script = compile(&source)?;

    let mut limits = config.limits.clone();
    if no_dependency {
        limits.enable_dependency = false;
    }

    let options = RuntimeOptions {
        limits,
        trace_path: paths.trace.clone().or_else(|| config.trace.path.clone()),
        model: build_model(config, ollama_endpoint, ollama_model),
    };

    let program = driver.unwrap_or(&config.device.program);
    let args = if driver_args.is_empty() {
        config.device.args.as_slice()
    } else {
        driver_args
    };
    let mut session = DeviceSession::launch(program, args)?;

    info!(script = %paths.script.display(), elements = script.elements.len(), "running script");
    let result = execute(&script, &document, &mut session, options);

    if let Err(e) = session.quit() {
        warn!(error = %e, "driver did not shut down cleanly");
    }

    match &result.error {
        None => println!(
            "Completed: {} actions in {} ms",
            result.action_count, result.elapsed_ms
        ),
        Some(report) => {
            eprintln!(
                "Failed at line {}: {}: {}",
                report
                    .source_line
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                report.error_type,
                report.message
            );
            let json = serde_json::to_string_pretty(report)?;
            match &paths.report {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{}", json),
            }
        }
    }

    Ok(result.completed)
}

/// Locator model when enabled in config or requested on the command line.
fn build_model(
    config: &AppConfig,
    ollama_endpoint: Option<&str>,
    ollama_model: Option<&str>,
) -> Option<Box<dyn LocatorModel>> {
    let endpoint = ollama_endpoint.or(config.model.endpoint.as_deref());
    let model = ollama_model.or(config.model.model.as_deref());
    if !config.model.enabled && endpoint.is_none() && model.is_none() {
        return None;
    }

    let defaults = OllamaLocator::default();
    Some(Box::new(OllamaLocator::new(
        endpoint.unwrap_or(&defaults.endpoint),
        model.unwrap_or(&defaults.model),
    )))
}

// ============================================================================
// compile subcommand
// ============================================================================

pub fn cmd_compile(script: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(script)?;
    let compiled = compile(&source)?;
    let json = serde_json::to_string_pretty(&compiled)?;

    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{}", json),
    }
    Ok(())
}

// ============================================================================
// classify subcommand
// ============================================================================

/// Print every screen's score and return the classified screen.
pub fn cmd_classify(
    doc: &Path,
    snapshot: &Path,
    config: &AppConfig,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let document = load_document(doc)?;
    let tree = load_tree(snapshot)?;

    for score in rank(&tree.fingerprint(), document.fingerprints()) {
        println!("  {:<32} {}", score.screen, score.size);
    }

    let screen = screen_of_tree(&document, &tree, config.limits.min_match_size);
    match &screen {
        Some(name) => println!("Screen: {}", name),
        None => println!("Screen: unknown"),
    }
    Ok(screen)
}

// ============================================================================
// skeleton subcommand
// ============================================================================

pub fn cmd_skeleton(snapshots: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let samples = snapshots
        .iter()
        .map(|path| load_tree(path).map(|tree| Fingerprint::of_tree(&tree)))
        .collect::<Result<Vec<_>, _>>()?;

    let merge = merge_samples(&samples);
    println!("{}", merge.fingerprint.to_markup());
    println!(
        "size {} (peak {}) over {} samples",
        merge.fingerprint.size(),
        merge.peak_size,
        samples.len()
    );
    if let Some(index) = merge.mismatched {
        println!(
            "sample {} ({}) does not look like the others",
            index,
            snapshots[index].display()
        );
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Snapshot files hold either a bare record array or a full snapshot object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Records(Vec<NodeRecord>),
    Snapshot(DeviceSnapshot),
}

pub fn load_snapshot(path: &Path) -> Result<DeviceSnapshot, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(match serde_json::from_str(&content)? {
        SnapshotFile::Records(views) => DeviceSnapshot::new(views),
        SnapshotFile::Snapshot(snapshot) => snapshot,
    })
}

fn load_tree(path: &Path) -> Result<UiTree, Box<dyn std::error::Error>> {
    let snapshot = load_snapshot(path)?;
    Ok(build(&snapshot.views)?)
}
