//! `itinera recover` command: run saved model output through the recovery
//! pipeline offline.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use itinera_core::recovery::{self, RecoveryError, TargetShape};

/// Read raw text from `path`, or from stdin when no path is given.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Recover `raw` as `shape` and render the result as pretty JSON.
pub fn render(raw: &str, shape: TargetShape) -> Result<String> {
    match recovery::recover(raw, shape) {
        Ok(doc) => serde_json::to_string_pretty(&doc).context("failed to encode document"),
        Err(err) => {
            if let RecoveryError::RepairFailed { excerpt, .. } = &err {
                eprintln!("Repaired text (truncated):\n{excerpt}");
            }
            Err(err).with_context(|| format!("could not recover {shape}"))
        }
    }
}

/// Run the recover command.
pub fn run_recover(shape: TargetShape, path: Option<&Path>) -> Result<()> {
    let raw = read_input(path)?;
    println!("{}", render(&raw, shape)?);
    Ok(())
}
