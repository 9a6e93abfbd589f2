use anyhow::{Context, Result};
use etask_core::Task;
use std::fs;
use std::path::{Path, PathBuf};

/// `$ETASK_HOME`, or `~/.etask`.
pub fn etask_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("ETASK_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".etask"))
}

pub fn ensure_etask_home() -> Result<PathBuf> {
    let dir = etask_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Read a JSON array of tasks in the backend's wire shape.
pub fn read_snapshot(path: &Path) -> Result<Vec<Task>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn write_snapshot(path: &Path, tasks: &[Task]) -> Result<()> {
    let json = serde_json::to_string_pretty(tasks).context("serialize snapshot")?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
