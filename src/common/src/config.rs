use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub script: ScriptLimits,
}

fn default_port() -> u16 {
    13000
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "lowercase")]
pub enum StorageConfig {
    Sqlite(Sqlite),
    Mysql(Mysql),
}

#[derive(Deserialize, Debug, Clone)]
pub struct Sqlite {
    pub path: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Mysql {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub db_name: String,
}

/// Bounds applied to every configuration function run.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ScriptLimits {
    pub max_source_len: usize,
    // 语法嵌套深度
    pub max_nesting: usize,
    pub max_steps: u64,
    pub max_call_depth: usize,
    // 字符串长度 / 数组元素个数
    pub max_value_len: usize,
    // 单次运行可分配的字节数
    pub max_memory: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_source_len: 64 * 1024,
            max_nesting: 128,
            max_steps: 100_000,
            max_call_depth: 64,
            max_value_len: 1024 * 1024,
            max_memory: 64 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn parse(s: &str) -> Result<Config> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Config::parse(&s)
    }
}
