use thiserror::Error;

use crate::path::PathError;
use crate::role::InvalidRole;

/// MappingError は組織ロール解決の致命的エラーを表す。
///
/// 組織が見つからない・マッピングが不正といった回復可能な状態はここには含まれず、
/// スキップ警告として [`crate::WarningSink`] に通知される。
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("empty user info JSON response provided")]
    EmptyDocument,

    #[error("failed to unmarshal user info JSON response: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("failed to search user info JSON response with provided path: \"{path}\": {source}")]
    Search {
        path: String,
        #[source]
        source: PathError,
    },

    #[error("failed to decode organization role projection from {query:?}: {message}")]
    InvalidProjection { query: String, message: String },

    #[error(transparent)]
    InvalidRole(#[from] InvalidRole),

    #[error("failed to resolve organization: {0}")]
    Registry(#[from] RegistryError),

    #[error("organization role resolution cancelled")]
    Cancelled,
}

/// ConfigError は組織マッピング設定の読み込み・検証エラーを表す。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file: {0}")]
    ReadFile(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("invalid org mapping rule {token:?}: expected claimValue:orgIdentifier:role, got {fields} field(s)")]
    InvalidRule { token: String, fields: usize },

    #[error("validation error: {0}")]
    Validation(String),
}

/// RegistryError は組織レジストリ自体の障害を表す。「見つからない」はエラーではない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("organization registry unavailable: {0}")]
    Unavailable(String),

    #[error("organization registry timeout: {0}")]
    Timeout(String),
}
