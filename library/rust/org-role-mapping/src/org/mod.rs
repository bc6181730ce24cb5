//! 組織解決: 組織名・組織 ID を外部レジストリで確認し、正規の組織 ID に変換する。

mod cached;
mod http;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::RegistryError;
use crate::mapping::Candidate;

pub use cached::CachedOrgRegistry;
pub use http::HttpOrgRegistry;

/// レジストリ上の組織。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
}

impl Organization {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// OrgRegistry は外部の組織レジストリへの照会を抽象化するトレイト。
///
/// 「存在しない」は `Ok(None)` / `Ok(false)` で表し、`Err` はレジストリ自体の障害に限る。
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait OrgRegistry: Send + Sync {
    /// 組織名の完全一致で組織 ID を取得する。
    async fn lookup_by_name(&self, name: &str) -> Result<Option<i64>, RegistryError>;

    /// 組織 ID が存在するかを確認する。
    async fn exists(&self, org_id: i64) -> Result<bool, RegistryError>;
}

/// InMemoryOrgRegistry はメモリ上の組織一覧を引くレジストリ実装。
pub struct InMemoryOrgRegistry {
    orgs: RwLock<Vec<Organization>>,
}

impl InMemoryOrgRegistry {
    pub fn new() -> Self {
        Self {
            orgs: RwLock::new(Vec::new()),
        }
    }

    pub fn with_orgs(orgs: Vec<Organization>) -> Self {
        Self {
            orgs: RwLock::new(orgs),
        }
    }

    pub async fn add_org(&self, org: Organization) {
        self.orgs.write().await.push(org);
    }
}

impl Default for InMemoryOrgRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrgRegistry for InMemoryOrgRegistry {
    async fn lookup_by_name(&self, name: &str) -> Result<Option<i64>, RegistryError> {
        let orgs = self.orgs.read().await;
        Ok(orgs.iter().find(|o| o.name == name).map(|o| o.id))
    }

    async fn exists(&self, org_id: i64) -> Result<bool, RegistryError> {
        let orgs = self.orgs.read().await;
        Ok(orgs.iter().any(|o| o.id == org_id))
    }
}

/// ResolveError は 1 候補の組織解決結果のうち、成功以外を表す。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// 回復可能: 警告を出してスキップする。
    #[error("organization not found")]
    NotFound,

    /// 回復可能: 組織 ID も組織名も持たない候補。
    #[error("incorrect organization mapping")]
    IncorrectMapping,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("organization lookup cancelled")]
    Cancelled,
}

/// OrgResolver は候補の組織識別子をレジストリで確認して組織 ID を返す。
///
/// 呼び出し間でキャッシュは持たない。キャッシュが必要なら
/// [`CachedOrgRegistry`] でレジストリ側をラップする。
#[derive(Clone)]
pub struct OrgResolver {
    registry: Arc<dyn OrgRegistry>,
}

impl OrgResolver {
    pub fn new(registry: Arc<dyn OrgRegistry>) -> Self {
        Self { registry }
    }

    /// 候補の組織を解決する。
    ///
    /// 数値 ID を持つ候補は存在確認のみ、組織名の候補は名前で照会する。
    /// レジストリ照会の直前にキャンセルを確認する。
    pub async fn resolve(
        &self,
        candidate: &Candidate,
        cancel: &CancellationToken,
    ) -> Result<i64, ResolveError> {
        if candidate.is_malformed() {
            return Err(ResolveError::IncorrectMapping);
        }
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        if candidate.org_id > 0 {
            return if self.registry.exists(candidate.org_id).await? {
                Ok(candidate.org_id)
            } else {
                Err(ResolveError::NotFound)
            };
        }

        self.registry
            .lookup_by_name(&candidate.org_name)
            .await?
            .ok_or(ResolveError::NotFound)
    }
}
