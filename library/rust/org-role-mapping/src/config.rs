//! 組織マッピング設定（YAML）の型定義と読み込み。

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::mapping::MappingSpec;
use crate::path::PathDialect;

/// 設定ファイル全体。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub org_mapping: MappingConfig,
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
}

/// 組織マッピングの設定。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// 現行方言: クレーム値を取り出すパス。
    pub org_attribute_path: String,
    pub path_dialect: PathDialect,
    /// 現行方言: `claimValue:orgIdentifier:role` ルール列。
    pub org_mapping: RuleList,
    /// レガシー方言: `{OrgName|OrgId, Role}` を射影する JMESPath 式。
    pub org_roles_attribute_path: String,
    pub skip_org_role_sync: bool,
    /// レジストリ照会の同時実行数。1 で逐次実行。
    pub max_concurrent_lookups: usize,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            org_attribute_path: String::new(),
            path_dialect: PathDialect::default(),
            org_mapping: RuleList::default(),
            org_roles_attribute_path: String::new(),
            skip_org_role_sync: false,
            max_concurrent_lookups: 1,
        }
    }
}

/// ルール列。空白区切りの 1 文字列、または YAML のリストで指定できる。
///
/// リスト形式では各要素が 1 ルールとなるため、空白を含むクレーム値も書ける。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RuleList {
    Inline(String),
    List(Vec<String>),
}

impl Default for RuleList {
    fn default() -> Self {
        RuleList::Inline(String::new())
    }
}

impl RuleList {
    /// 設定順のルールトークンを返す。空要素は除く。
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            RuleList::Inline(s) => s.split_whitespace().collect(),
            RuleList::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// HTTP 組織レジストリの接続設定。
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    pub url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

impl RegistryConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_token: None,
            timeout_secs: default_timeout_secs(),
            cache: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 組織名照会結果のキャッシュ設定。
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_cache_capacity() -> u64 {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Config {
    /// YAML 文字列から設定を読み込む。
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// YAML ファイルを読み込み Config を返す。
pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let data = std::fs::read_to_string(path)?;
    Config::from_yaml_str(&data)
}

/// 設定値のバリデーション。マッピングルールの解析もここで行い、
/// 運用者の設定ミスを起動時に検出する。
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.org_mapping.max_concurrent_lookups == 0 {
        return Err(ConfigError::Validation(
            "org_mapping.max_concurrent_lookups must be > 0".into(),
        ));
    }
    MappingSpec::parse(&config.org_mapping)?;

    if let Some(registry) = &config.registry {
        if registry.url.trim().is_empty() {
            return Err(ConfigError::Validation("registry.url is required".into()));
        }
        if registry.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "registry.timeout_secs must be > 0".into(),
            ));
        }
        if let Some(cache) = &registry.cache {
            if cache.max_capacity == 0 {
                return Err(ConfigError::Validation(
                    "registry.cache.max_capacity must be > 0".into(),
                ));
            }
        }
    }
    Ok(())
}
