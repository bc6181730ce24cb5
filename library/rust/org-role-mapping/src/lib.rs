//! org-role-mapping: IdP の userinfo クレームから組織ごとのロールを解決するライブラリ
//!
//! 運用者が設定したマッピングルールに従ってクレーム値を組織・ロールへ変換し、
//! 組織レジストリで存在確認を行ったうえで「組織 ID → ロール」のマップを返す。
//! 存在しない組織や不正なマッピングは警告を出してスキップする。
//!
//! # 使い方
//!
//! ```ignore
//! use org_role_mapping::{config, InMemoryOrgRegistry, Organization, OrgRoleResolver, TracingWarningSink};
//! use std::sync::Arc;
//!
//! let cfg = config::load("org-mapping.yaml")?;
//! let registry = Arc::new(InMemoryOrgRegistry::with_orgs(vec![Organization::new(11, "org_foo")]));
//! let resolver = OrgRoleResolver::from_config(&cfg.org_mapping, registry, Arc::new(TracingWarningSink))?;
//!
//! let roles = resolver.resolve(br#"{"info": {"roles": ["org_foo"]}}"#).await?;
//! ```

pub mod config;
pub mod error;
pub mod mapping;
pub mod org;
pub mod path;
pub mod resolver;
pub mod role;
pub mod warning;

pub use config::{CacheConfig, Config, MappingConfig, RegistryConfig, RuleList};
pub use error::{ConfigError, MappingError, RegistryError};
pub use mapping::{Candidate, CandidateSource, ClaimMapping, MappingRule, MappingSpec, OrgRef, Projection};
pub use org::{
    CachedOrgRegistry, HttpOrgRegistry, InMemoryOrgRegistry, OrgRegistry, OrgResolver, Organization,
    ResolveError,
};
pub use path::{PathDialect, PathError};
pub use resolver::{OrgRoleResolver, OrgRoles};
pub use role::{InvalidRole, Role};
pub use warning::{RecordingWarningSink, SkipReason, SkipWarning, TracingWarningSink, WarningSink};

#[cfg(feature = "mock")]
pub use org::MockOrgRegistry;
