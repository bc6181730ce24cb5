//! 組織ロールの語彙と検証。

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 組織内で付与されるロール。
///
/// 語彙は閉じており、`None` はアクセス権なしを表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    None,
    Viewer,
    Editor,
    Admin,
}

/// ロール語彙に含まれないトークンを受け取ったことを表す。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role type: {0}")]
pub struct InvalidRole(pub String);

impl Role {
    /// 設定ファイル・クレーム上の正規表記を返す。
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::None => "None",
            Role::Viewer => "Viewer",
            Role::Editor => "Editor",
            Role::Admin => "Admin",
        }
    }
}

impl FromStr for Role {
    type Err = InvalidRole;

    /// 大文字小文字を区別して照合する。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Role::None),
            "Viewer" => Ok(Role::Viewer),
            "Editor" => Ok(Role::Editor),
            "Admin" => Ok(Role::Admin),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}
