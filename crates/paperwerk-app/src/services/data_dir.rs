// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution and the persisted `config.json`.

use std::path::{Path, PathBuf};

use paperwerk_core::EngineConfig;
use paperwerk_core::error::Result;

const CONFIG_FILE: &str = "config.json";

/// Conventional data directory: `$XDG_DATA_HOME/paperwerk`, falling back to
/// `~/.local/share/paperwerk`.
pub fn default_data_dir() -> PathBuf {
    base_dir(|key| std::env::var(key).ok()).join("paperwerk")
}

fn base_dir<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(xdg) = lookup("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg);
    }
    if let Some(home) = lookup("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}

/// Load the configuration for a run.
///
/// `data_dir` is the directory from the command line, which already covers
/// `PAPERWERK_DATA_DIR`. Remaining `PAPERWERK_*` variables override settings
/// from `config.json` but never move the data directory.
pub fn resolve_config<F>(data_dir: Option<PathBuf>, lookup: F) -> Result<(EngineConfig, bool)>
where
    F: Fn(&str) -> Option<String>,
{
    let root = data_dir.unwrap_or_else(default_data_dir);
    let (mut config, created) = load_or_create_config(&root)?;
    config.apply_env_overrides(lookup);
    Ok((config, created))
}

/// Load `config.json` from `data_dir`, writing the defaults on first use.
///
/// Returns the config and whether it was created. The returned config is
/// always rooted at `data_dir`.
pub fn load_or_create_config(data_dir: &Path) -> Result<(EngineConfig, bool)> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(CONFIG_FILE);

    if path.exists() {
        let data = std::fs::read_to_string(&path)?;
        let mut config: EngineConfig = serde_json::from_str(&data)?;
        config.data_dir = data_dir.to_path_buf();
        Ok((config, false))
    } else {
        let config = EngineConfig::with_data_dir(data_dir);
        persist_config(data_dir, &config)?;
        Ok((config, true))
    }
}

pub fn persist_config(data_dir: &Path, config: &EngineConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use paperwerk_core::config::{ENV_DATA_DIR, ENV_OCR_LANGUAGES};

    #[test]
    fn xdg_wins_over_home() {
        let env = HashMap::from([("XDG_DATA_HOME", "/xdg"), ("HOME", "/home/ada")]);
        let base = base_dir(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(base, PathBuf::from("/xdg"));

        let env = HashMap::from([("XDG_DATA_HOME", ""), ("HOME", "/home/ada")]);
        let base = base_dir(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(base, PathBuf::from("/home/ada/.local/share"));
    }

    #[test]
    fn first_load_writes_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("data");

        let (config, created) = load_or_create_config(&root).expect("load");
        assert!(created);
        assert_eq!(config.data_dir, root);
        assert!(root.join(CONFIG_FILE).exists());

        let (again, created) = load_or_create_config(&root).expect("reload");
        assert!(!created);
        assert_eq!(again, config);
    }

    #[test]
    fn persisted_settings_are_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = EngineConfig::with_data_dir(dir.path());
        config.ocr_languages = "fra".into();
        config.index_batch_size = 7;
        persist_config(dir.path(), &config).expect("persist");

        let (loaded, created) = load_or_create_config(dir.path()).expect("load");
        assert!(!created);
        assert_eq!(loaded.ocr_languages, "fra");
        assert_eq!(loaded.index_batch_size, 7);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE), r#"{ "log_filter": "debug" }"#).expect("write");

        let (loaded, _) = load_or_create_config(dir.path()).expect("load");
        assert_eq!(loaded.log_filter, "debug");
        assert_eq!(loaded.database_file, "paperwerk.db");
    }

    #[test]
    fn explicit_directory_beats_environment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let flag = dir.path().join("flag");
        let from_env = dir.path().join("env");
        let env = HashMap::from([
            (ENV_DATA_DIR, from_env.to_string_lossy().into_owned()),
            (ENV_OCR_LANGUAGES, "ita".to_string()),
        ]);

        let (config, created) =
            resolve_config(Some(flag.clone()), |k| env.get(k).cloned()).expect("resolve");

        assert!(created);
        assert_eq!(config.data_dir, flag);
        assert_eq!(config.database_path(), flag.join("paperwerk.db"));
        assert_eq!(config.ocr_languages, "ita");
        assert!(!from_env.exists());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE), "not json").expect("write");
        assert!(load_or_create_config(dir.path()).is_err());
    }
}
