use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use super::OrgRegistry;
use crate::config::CacheConfig;
use crate::error::RegistryError;

/// CachedOrgRegistry は OrgRegistry を TTL 付きキャッシュでラップする。
///
/// 見つかった組織のみキャッシュする。未登録の組織は後から作成されうるため、
/// 「存在しない」結果は毎回レジストリに問い合わせる。
pub struct CachedOrgRegistry {
    inner: Arc<dyn OrgRegistry>,
    names: Cache<String, i64>,
    ids: Cache<i64, ()>,
}

impl CachedOrgRegistry {
    /// 新しい CachedOrgRegistry を作成する。
    ///
    /// # Arguments
    /// * `max_capacity` - キャッシュに保持する最大エントリ数（名前・ID それぞれ）
    /// * `ttl` - エントリの有効期間
    pub fn new(inner: Arc<dyn OrgRegistry>, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            names: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            ids: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn from_config(inner: Arc<dyn OrgRegistry>, config: &CacheConfig) -> Self {
        Self::new(inner, config.max_capacity, Duration::from_secs(config.ttl_secs))
    }
}

#[async_trait]
impl OrgRegistry for CachedOrgRegistry {
    async fn lookup_by_name(&self, name: &str) -> Result<Option<i64>, RegistryError> {
        if let Some(id) = self.names.get(name).await {
            return Ok(Some(id));
        }

        let found = self.inner.lookup_by_name(name).await?;
        if let Some(id) = found {
            self.names.insert(name.to_string(), id).await;
        }
        Ok(found)
    }

    async fn exists(&self, org_id: i64) -> Result<bool, RegistryError> {
        if self.ids.get(&org_id).await.is_some() {
            return Ok(true);
        }

        let exists = self.inner.exists(org_id).await?;
        if exists {
            self.ids.insert(org_id, ()).await;
        }
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::org::MockOrgRegistry;

    fn cached(mock: MockOrgRegistry) -> CachedOrgRegistry {
        CachedOrgRegistry::new(Arc::new(mock), 100, Duration::from_secs(60))
    }

    /// キャッシュヒット時はレジストリへの照会をスキップする。
    #[tokio::test]
    async fn test_name_hit_skips_registry() {
        let mut mock = MockOrgRegistry::new();
        mock.expect_lookup_by_name()
            .withf(|name| name == "org_foo")
            .once()
            .returning(|_| Ok(Some(11)));

        let registry = cached(mock);
        assert_eq!(registry.lookup_by_name("org_foo").await.unwrap(), Some(11));
        assert_eq!(registry.lookup_by_name("org_foo").await.unwrap(), Some(11));
    }

    /// 見つからなかった結果はキャッシュしない。
    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let mut mock = MockOrgRegistry::new();
        mock.expect_lookup_by_name().times(2).returning(|_| Ok(None));

        let registry = cached(mock);
        assert_eq!(registry.lookup_by_name("invalid_org").await.unwrap(), None);
        assert_eq!(registry.lookup_by_name("invalid_org").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_exists_hit_skips_registry() {
        let mut mock = MockOrgRegistry::new();
        mock.expect_exists().withf(|id| *id == 12).once().returning(|_| Ok(true));

        let registry = cached(mock);
        assert!(registry.exists(12).await.unwrap());
        assert!(registry.exists(12).await.unwrap());
    }

    #[tokio::test]
    async fn test_registry_error_propagates() {
        let mut mock = MockOrgRegistry::new();
        mock.expect_exists()
            .returning(|_| Err(RegistryError::Timeout("deadline exceeded".into())));

        let registry = cached(mock);
        assert_eq!(
            registry.exists(12).await,
            Err(RegistryError::Timeout("deadline exceeded".into()))
        );
    }

    #[test]
    fn test_from_config() {
        let registry = CachedOrgRegistry::from_config(
            Arc::new(MockOrgRegistry::new()),
            &CacheConfig::default(),
        );
        assert_eq!(registry.names.entry_count(), 0);
    }
}
