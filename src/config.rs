use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// トラッカーAPIへの接続設定。
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub api_token: String,
}

/// 設定ファイルの内容。各フィールドは環境変数で上書きできる。
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_url: Option<String>,
    api_token: Option<String>,
}

impl Config {
    /// 環境変数と設定ファイルから接続設定を解決する。
    ///
    /// 環境変数`TIMEGRID_API_URL` / `TIMEGRID_API_TOKEN`が優先され、
    /// 無ければ設定ファイル(config dir配下の`timegrid/config.json`)を読む。
    /// どちらからも得られない場合はエラーを返す。
    pub fn load() -> Result<Self> {
        let file = read_file_config()?;
        resolve(
            env::var("TIMEGRID_API_URL").ok(),
            env::var("TIMEGRID_API_TOKEN").ok(),
            file,
        )
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("timegrid").join("config.json"))
}

fn read_file_config() -> Result<FileConfig> {
    let path = match config_path() {
        Some(path) if path.exists() => path,
        _ => return Ok(FileConfig::default()),
    };
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn resolve(
    env_url: Option<String>,
    env_token: Option<String>,
    file: FileConfig,
) -> Result<Config> {
    let api_url = env_url
        .or(file.api_url)
        .context("TIMEGRID_API_URL must be set (or api_url in the config file)")?;
    let api_token = env_token
        .or(file.api_token)
        .context("TIMEGRID_API_TOKEN must be set (or api_token in the config file)")?;

    Ok(Config { api_url, api_token })
}
