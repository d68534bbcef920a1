use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

pub fn ensure_directories(cfg: &DirectoryConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(Path::new(&cfg.logs_dir))?;
    let data_dir = ensure_dir(Path::new(&cfg.data_dir))?;
    probe_writable(&data_dir)?;

    Ok(ResolvedPaths {
        db_path: data_dir.join(&cfg.db_filename),
        logs_dir,
        data_dir,
    })
}

fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    Ok(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()))
}

fn probe_writable(dir: &Path) -> Result<()> {
    let probe = dir.join(".write-test");
    fs::write(&probe, b"ok").with_context(|| format!("{} is not writable", dir.display()))?;
    fs::remove_file(&probe)?;
    Ok(())
}
