//! 組織ロール解決のオーケストレーター。

use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::MappingConfig;
use crate::error::{ConfigError, MappingError};
use crate::mapping::{Candidate, CandidateSource, MappingSpec};
use crate::org::{OrgRegistry, OrgResolver, ResolveError};
use crate::role::Role;
use crate::warning::{SkipReason, SkipWarning, WarningSink};

/// 組織 ID → ロール。キー順が固定されるため、同一入力に対して同一の結果になる。
pub type OrgRoles = BTreeMap<i64, Role>;

/// 候補 1 件の解決結果。
enum Outcome {
    Resolved(i64, Role),
    Skipped(SkipReason),
}

/// OrgRoleResolver は userinfo JSON とマッピング仕様から組織ロールを解決する。
///
/// 呼び出し間で可変状態を持たないため、1 インスタンスを複数の並行呼び出しで共有できる。
pub struct OrgRoleResolver {
    spec: Arc<MappingSpec>,
    orgs: OrgResolver,
    sink: Arc<dyn WarningSink>,
    max_concurrent_lookups: usize,
}

impl OrgRoleResolver {
    pub fn new(
        spec: Arc<MappingSpec>,
        registry: Arc<dyn OrgRegistry>,
        sink: Arc<dyn WarningSink>,
    ) -> Self {
        Self {
            spec,
            orgs: OrgResolver::new(registry),
            sink,
            max_concurrent_lookups: 1,
        }
    }

    /// 設定を解析して OrgRoleResolver を構築する。不正なルールはここでエラーになる。
    pub fn from_config(
        config: &MappingConfig,
        registry: Arc<dyn OrgRegistry>,
        sink: Arc<dyn WarningSink>,
    ) -> Result<Self, ConfigError> {
        let spec = MappingSpec::parse(config)?;
        Ok(Self::new(Arc::new(spec), registry, sink)
            .with_max_concurrent_lookups(config.max_concurrent_lookups))
    }

    /// レジストリ照会の同時実行数を設定する。結果のマージ順は常に候補の生成順。
    pub fn with_max_concurrent_lookups(mut self, n: usize) -> Self {
        self.max_concurrent_lookups = n.max(1);
        self
    }

    pub fn spec(&self) -> &MappingSpec {
        &self.spec
    }

    /// 生の userinfo JSON から組織ロールを解決する。
    pub async fn resolve(&self, raw: &[u8]) -> Result<OrgRoles, MappingError> {
        self.resolve_with_cancel(raw, &CancellationToken::new())
            .await
    }

    /// キャンセルトークン付きで組織ロールを解決する。
    ///
    /// 致命的エラーの場合は部分的な結果を返さない。組織が見つからない候補、
    /// 不正な候補は警告を出してスキップし、解決を続ける。
    /// 同じ組織に複数の候補が解決された場合は、後の候補が優先される。
    pub async fn resolve_with_cancel(
        &self,
        raw: &[u8],
        cancel: &CancellationToken,
    ) -> Result<OrgRoles, MappingError> {
        let Some(source) = self.spec.source() else {
            return Ok(OrgRoles::new());
        };
        let config_option = source.config_option().to_string();
        let candidates = expand(source, raw)?;

        let mut outcomes = stream::iter(candidates)
            .map(move |candidate| async move {
                let outcome = self.lookup(&candidate, cancel).await;
                (candidate, outcome)
            })
            .buffered(self.max_concurrent_lookups);

        let mut org_roles = OrgRoles::new();
        while let Some((candidate, outcome)) = outcomes.next().await {
            match outcome? {
                Outcome::Resolved(org_id, role) => {
                    org_roles.insert(org_id, role);
                }
                Outcome::Skipped(reason) => self.sink.warn(&SkipWarning {
                    reason,
                    config_option: config_option.clone(),
                    rule_text: candidate.rule_text.clone(),
                    candidate,
                }),
            }
        }

        Ok(org_roles)
    }

    /// ロールを検証してから組織を解決する。
    async fn lookup(
        &self,
        candidate: &Candidate,
        cancel: &CancellationToken,
    ) -> Result<Outcome, MappingError> {
        let role: Role = candidate.role_text.parse()?;

        match self.orgs.resolve(candidate, cancel).await {
            Ok(org_id) => Ok(Outcome::Resolved(org_id, role)),
            Err(ResolveError::NotFound) => Ok(Outcome::Skipped(SkipReason::UnknownOrganization)),
            Err(ResolveError::IncorrectMapping) => Ok(Outcome::Skipped(SkipReason::IncorrectMapping)),
            Err(ResolveError::Registry(e)) => Err(MappingError::Registry(e)),
            Err(ResolveError::Cancelled) => Err(MappingError::Cancelled),
        }
    }
}

/// JSON を解析し、評価順の候補列を生成する。
fn expand(source: &dyn CandidateSource, raw: &[u8]) -> Result<Vec<Candidate>, MappingError> {
    if raw.is_empty() {
        return Err(MappingError::EmptyDocument);
    }
    let document: Value = serde_json::from_slice(raw)?;
    source.candidates(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleList;
    use crate::error::RegistryError;
    use crate::org::{InMemoryOrgRegistry, MockOrgRegistry, Organization};
    use crate::warning::RecordingWarningSink;

    fn config(path: &str, mapping: &str) -> MappingConfig {
        MappingConfig {
            org_attribute_path: path.into(),
            org_mapping: RuleList::Inline(mapping.into()),
            ..MappingConfig::default()
        }
    }

    fn registry() -> Arc<dyn OrgRegistry> {
        Arc::new(InMemoryOrgRegistry::with_orgs(vec![
            Organization::new(11, "org_foo"),
            Organization::new(12, "org_bar"),
            Organization::new(13, "org_baz"),
        ]))
    }

    fn resolver(config: &MappingConfig, sink: Arc<RecordingWarningSink>) -> OrgRoleResolver {
        OrgRoleResolver::from_config(config, registry(), sink).unwrap()
    }

    #[tokio::test]
    async fn test_unconfigured_returns_empty_without_parsing() {
        let mut mock = MockOrgRegistry::new();
        mock.expect_lookup_by_name().never();
        mock.expect_exists().never();

        let sink = Arc::new(RecordingWarningSink::new());
        let resolver = OrgRoleResolver::from_config(&MappingConfig::default(), Arc::new(mock), sink.clone())
            .unwrap();

        // 未設定の場合は JSON の妥当性も問わない
        let roles = resolver.resolve(b"not json").await.unwrap();
        assert!(roles.is_empty());
        assert!(sink.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_empty_document() {
        let sink = Arc::new(RecordingWarningSink::new());
        let resolver = resolver(&config("info.roles", "org_foo:org_foo:Editor"), sink);
        let err = resolver.resolve(b"").await.unwrap_err();
        assert!(matches!(err, MappingError::EmptyDocument));
        assert_eq!(err.to_string(), "empty user info JSON response provided");
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let sink = Arc::new(RecordingWarningSink::new());
        let resolver = resolver(&config("info.roles", "org_foo:org_foo:Editor"), sink);
        let err = resolver.resolve(b"{\"info\":").await.unwrap_err();
        assert!(matches!(err, MappingError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn test_numeric_org_identifier() {
        let sink = Arc::new(RecordingWarningSink::new());
        let resolver = resolver(&config("info.roles", "org_foo:12:Admin org_foo:99:Viewer"), sink.clone());
        let roles = resolver
            .resolve(br#"{"info": {"roles": ["org_foo"]}}"#)
            .await
            .unwrap();
        assert_eq!(roles, OrgRoles::from([(12, Role::Admin)]));

        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].reason, SkipReason::UnknownOrganization);
        assert_eq!(warnings[0].rule_text, "org_foo:99:Viewer");
    }

    #[tokio::test]
    async fn test_incorrect_mapping_warning() {
        let sink = Arc::new(RecordingWarningSink::new());
        let resolver = resolver(
            &config("info.roles", "org_foo:0:Editor org_foo::Viewer org_foo:org_foo:Admin"),
            sink.clone(),
        );
        let roles = resolver
            .resolve(br#"{"info": {"roles": ["org_foo"]}}"#)
            .await
            .unwrap();
        assert_eq!(roles, OrgRoles::from([(11, Role::Admin)]));

        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .iter()
            .all(|w| w.reason == SkipReason::IncorrectMapping && w.config_option == "info.roles"));
        assert_eq!(warnings[0].rule_text, "org_foo:0:Editor");
        assert_eq!(warnings[1].rule_text, "org_foo::Viewer");
    }

    #[tokio::test]
    async fn test_invalid_role_aborts_before_lookup() {
        let mut mock = MockOrgRegistry::new();
        mock.expect_lookup_by_name().never();

        let sink = Arc::new(RecordingWarningSink::new());
        let resolver = OrgRoleResolver::from_config(
            &config("info.roles", "org_foo:org_foo:editor"),
            Arc::new(mock),
            sink,
        )
        .unwrap();
        let err = resolver
            .resolve(br#"{"info": {"roles": ["org_foo"]}}"#)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid role type: editor");
    }

    #[tokio::test]
    async fn test_registry_failure_is_fatal() {
        let mut mock = MockOrgRegistry::new();
        mock.expect_lookup_by_name()
            .returning(|_| Err(RegistryError::Unavailable("connection refused".into())));

        let sink = Arc::new(RecordingWarningSink::new());
        let resolver = OrgRoleResolver::from_config(
            &config("info.roles", "org_foo:org_foo:Editor"),
            Arc::new(mock),
            sink.clone(),
        )
        .unwrap();
        let err = resolver
            .resolve(br#"{"info": {"roles": ["org_foo"]}}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, MappingError::Registry(_)));
        assert_eq!(
            err.to_string(),
            "failed to resolve organization: organization registry unavailable: connection refused"
        );
        assert!(sink.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token() {
        let mut mock = MockOrgRegistry::new();
        mock.expect_lookup_by_name().never();

        let sink = Arc::new(RecordingWarningSink::new());
        let resolver = OrgRoleResolver::from_config(
            &config("info.roles", "org_foo:org_foo:Editor"),
            Arc::new(mock),
            sink,
        )
        .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = resolver
            .resolve_with_cancel(br#"{"info": {"roles": ["org_foo"]}}"#, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, MappingError::Cancelled));
    }

    #[tokio::test]
    async fn test_concurrent_lookups_keep_generation_order() {
        let mapping = "org_foo:org_foo:Editor org_foo:missing:Viewer org_bar:org_foo:Admin \
                       org_bar:org_bar:Viewer *:org_baz:Editor org_baz:org_baz:Admin";
        let raw = br#"{"info": {"roles": ["org_foo", "org_bar", "org_baz"]}}"#;

        let sequential_sink = Arc::new(RecordingWarningSink::new());
        let sequential = resolver(&config("info.roles", mapping), sequential_sink.clone());

        let parallel_sink = Arc::new(RecordingWarningSink::new());
        let parallel = resolver(&config("info.roles", mapping), parallel_sink.clone())
            .with_max_concurrent_lookups(8);

        let expected = OrgRoles::from([(11, Role::Admin), (12, Role::Viewer), (13, Role::Admin)]);
        assert_eq!(sequential.resolve(raw).await.unwrap(), expected);
        assert_eq!(parallel.resolve(raw).await.unwrap(), expected);
        assert_eq!(sequential_sink.warnings(), parallel_sink.warnings());
        assert_eq!(parallel_sink.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_shared_across_tasks() {
        let sink = Arc::new(RecordingWarningSink::new());
        let resolver = Arc::new(resolver(
            &config("info.roles", "org_foo:org_foo:Editor org_bar:org_bar:Viewer"),
            sink,
        ));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                resolver
                    .resolve(br#"{"info": {"roles": ["org_foo", "org_bar"]}}"#)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(
                handle.await.unwrap(),
                OrgRoles::from([(11, Role::Editor), (12, Role::Viewer)])
            );
        }
    }
}
