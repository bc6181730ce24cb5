//! マッピング仕様: 運用者が設定した組織マッピングを解析し、候補を展開する。
//!
//! 2 つの設定方言をサポートする。
//!
//! - 現行方言: `org_attribute_path` でクレーム値を取り出し、
//!   `claimValue:orgIdentifier:role` 形式のルール列と突き合わせる。
//! - レガシー方言: `org_roles_attribute_path` の JMESPath 式自体が
//!   `{OrgName|OrgId, Role}` オブジェクトを射影する。

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::config::MappingConfig;
use crate::error::{ConfigError, MappingError};
use crate::path::{self, PathDialect};

/// 任意のクレーム値にマッチするワイルドカード。
pub const WILDCARD: &str = "*";

/// ルールが指す組織。数値として解釈できれば ID、それ以外は組織名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgRef {
    Id(i64),
    Name(String),
}

impl OrgRef {
    fn parse(field: &str) -> Self {
        field
            .parse::<i64>()
            .map_or_else(|_| OrgRef::Name(field.to_string()), OrgRef::Id)
    }
}

/// 現行方言の 1 ルール。解析後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    pub match_value: String,
    pub org: OrgRef,
    /// ロールは解決時に検証する。
    pub role_text: String,
    /// 設定上の元のトークン。警告ログに使う。
    pub raw: String,
}

impl MappingRule {
    /// `claimValue:orgIdentifier:role` 形式のトークンを解析する。
    ///
    /// フィールド数が 3 以外の場合は設定エラー。空フィールドは解析時には許容し、
    /// 解決時に不正マッピングとして扱う。
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        let fields: Vec<&str> = token.split(':').collect();
        let [match_value, org, role] = fields.as_slice() else {
            return Err(ConfigError::InvalidRule {
                token: token.to_string(),
                fields: fields.len(),
            });
        };

        Ok(Self {
            match_value: (*match_value).to_string(),
            org: OrgRef::parse(org),
            role_text: (*role).to_string(),
            raw: token.to_string(),
        })
    }

    /// クレーム値がこのルールにマッチするかを判定する。
    pub fn matches(&self, claim_value: &str) -> bool {
        self.match_value == WILDCARD || self.match_value == claim_value
    }

    fn candidate(&self, claim_value: &str) -> Candidate {
        let (org_id, org_name) = match &self.org {
            OrgRef::Id(id) => (*id, String::new()),
            OrgRef::Name(name) => (0, name.clone()),
        };
        Candidate {
            external_org: claim_value.to_string(),
            org_id,
            org_name,
            role_text: self.role_text.clone(),
            rule_text: self.raw.clone(),
        }
    }
}

/// 組織解決前の中間候補。1 回の解決呼び出しの中でのみ使われる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// 候補を生んだクレーム値。レガシー方言では空。
    pub external_org: String,
    /// 0 以下は「ID 指定なし」。
    pub org_id: i64,
    pub org_name: String,
    pub role_text: String,
    pub rule_text: String,
}

impl Candidate {
    /// 組織 ID も組織名も持たない構造的に不正な候補かを判定する。
    pub fn is_malformed(&self) -> bool {
        self.org_id <= 0 && self.org_name.is_empty()
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} {} {} {}}}",
            self.external_org, self.org_id, self.org_name, self.role_text
        )
    }
}

/// ドキュメントから候補を生成する能力。各方言が実装する。
pub trait CandidateSource: Send + Sync {
    /// 警告ログの `config_option` に出力する設定値。
    fn config_option(&self) -> &str;

    /// 評価順に候補を生成する。
    fn candidates(&self, document: &Value) -> Result<Vec<Candidate>, MappingError>;
}

/// 現行方言: クレームパス + ルール列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimMapping {
    pub claims_path: String,
    pub dialect: PathDialect,
    pub rules: Vec<MappingRule>,
}

impl CandidateSource for ClaimMapping {
    fn config_option(&self) -> &str {
        &self.claims_path
    }

    fn candidates(&self, document: &Value) -> Result<Vec<Candidate>, MappingError> {
        let values = path::evaluate(self.dialect, &self.claims_path, document).map_err(|source| {
            MappingError::Search {
                path: self.claims_path.clone(),
                source,
            }
        })?;

        let mut candidates = Vec::new();
        for claim in values.iter().filter_map(claim_text) {
            for rule in self.rules.iter().filter(|r| r.matches(&claim)) {
                candidates.push(rule.candidate(&claim));
            }
        }
        Ok(candidates)
    }
}

/// スカラーのクレーム値を文字列化する。オブジェクト・配列・null は対象外。
fn claim_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// レガシー方言: JMESPath 式が組織ロールのオブジェクトを直接射影する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub query: String,
}

/// 射影結果の 1 要素。
///
/// マルチセレクトハッシュは元のフィールドが無くてもキーを `null` で出力するため、
/// 欠落と `null` はどちらも未指定として扱う。
#[derive(Debug, Deserialize)]
struct ProjectedOrgRole {
    #[serde(rename = "OrgId", alias = "OrgID", default)]
    org_id: Option<i64>,
    #[serde(rename = "OrgName", default)]
    org_name: Option<String>,
    #[serde(rename = "Role", default)]
    role: Option<String>,
}

impl CandidateSource for Projection {
    fn config_option(&self) -> &str {
        &self.query
    }

    fn candidates(&self, document: &Value) -> Result<Vec<Candidate>, MappingError> {
        let values = path::evaluate(PathDialect::JmesPath, &self.query, document).map_err(|source| {
            MappingError::Search {
                path: self.query.clone(),
                source,
            }
        })?;

        values
            .into_iter()
            .map(|value| {
                if !value.is_object() {
                    return Err(MappingError::InvalidProjection {
                        query: self.query.clone(),
                        message: format!("expected an object, got {value}"),
                    });
                }
                let projected: ProjectedOrgRole =
                    serde_json::from_value(value).map_err(|e| MappingError::InvalidProjection {
                        query: self.query.clone(),
                        message: e.to_string(),
                    })?;
                Ok(Candidate {
                    external_org: String::new(),
                    org_id: projected.org_id.unwrap_or_default(),
                    org_name: projected.org_name.unwrap_or_default(),
                    role_text: projected.role.unwrap_or_default(),
                    rule_text: self.query.clone(),
                })
            })
            .collect()
    }
}

/// 解析・検証済みのマッピング仕様。プロバイダ設定ごとに 1 度だけ構築し、
/// 以降は読み取り専用で複数の解決呼び出しから共有される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingSpec {
    Unconfigured,
    Current(ClaimMapping),
    Legacy(Projection),
}

impl MappingSpec {
    /// 設定からマッピング仕様を構築する。
    ///
    /// 組織レジストリへの照会やロールの検証はここでは行わない。
    pub fn parse(config: &MappingConfig) -> Result<Self, ConfigError> {
        if config.skip_org_role_sync {
            return Ok(MappingSpec::Unconfigured);
        }

        let claims_path = config.org_attribute_path.trim();
        let query = config.org_roles_attribute_path.trim();
        let tokens = config.org_mapping.tokens();

        if !query.is_empty() {
            if !claims_path.is_empty() || !tokens.is_empty() {
                return Err(ConfigError::Validation(
                    "org_roles_attribute_path cannot be combined with org_attribute_path or org_mapping"
                        .into(),
                ));
            }
            if config.path_dialect != PathDialect::JmesPath {
                return Err(ConfigError::Validation(
                    "org_roles_attribute_path requires path_dialect jmespath".into(),
                ));
            }
            return Ok(MappingSpec::Legacy(Projection {
                query: query.to_string(),
            }));
        }

        if claims_path.is_empty() {
            if !tokens.is_empty() {
                return Err(ConfigError::Validation(
                    "org_mapping requires org_attribute_path".into(),
                ));
            }
            return Ok(MappingSpec::Unconfigured);
        }

        let rules = tokens
            .into_iter()
            .map(MappingRule::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MappingSpec::Current(ClaimMapping {
            claims_path: claims_path.to_string(),
            dialect: config.path_dialect,
            rules,
        }))
    }

    /// 候補の生成元を返す。未設定の場合は `None`。
    pub fn source(&self) -> Option<&dyn CandidateSource> {
        match self {
            MappingSpec::Unconfigured => None,
            MappingSpec::Current(mapping) => Some(mapping),
            MappingSpec::Legacy(projection) => Some(projection),
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, MappingSpec::Unconfigured)
    }

    /// 現行方言のルール列。レガシー方言・未設定では空。
    pub fn rules(&self) -> &[MappingRule] {
        match self {
            MappingSpec::Current(mapping) => &mapping.rules,
            _ => &[],
        }
    }
}
