use anyhow::{bail, Context, Result};
use org_role_mapping::{
    config, CachedOrgRegistry, Config, HttpOrgRegistry, InMemoryOrgRegistry, OrgRegistry,
    OrgRoleResolver, Organization, TracingWarningSink,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::ResolveArgs;

/// userinfo JSON から組織ロールを解決し、結果を JSON で標準出力に書き出す。
pub async fn run(args: &ResolveArgs, cancel: &CancellationToken) -> Result<()> {
    let cfg = config::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    config::validate(&cfg)?;

    let registry = build_registry(&cfg, args.orgs.as_deref())?;
    let resolver = OrgRoleResolver::from_config(
        &cfg.org_mapping,
        registry,
        Arc::new(TracingWarningSink),
    )?;

    let raw = std::fs::read(&args.claims)
        .with_context(|| format!("failed to read user info {}", args.claims.display()))?;
    let org_roles = resolver.resolve_with_cancel(&raw, cancel).await?;

    tracing::debug!(orgs = org_roles.len(), "organization roles resolved");
    println!("{}", serde_json::to_string(&org_roles)?);
    Ok(())
}

/// `--orgs` が指定されていればファイルの組織一覧を、なければ設定の HTTP レジストリを使う。
fn build_registry(cfg: &Config, orgs: Option<&Path>) -> Result<Arc<dyn OrgRegistry>> {
    if let Some(path) = orgs {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read organizations {}", path.display()))?;
        let orgs: Vec<Organization> = serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse organizations {}", path.display()))?;
        return Ok(Arc::new(InMemoryOrgRegistry::with_orgs(orgs)));
    }

    let Some(registry) = &cfg.registry else {
        bail!("no organization registry: pass --orgs or set registry.url in the config");
    };
    let http: Arc<dyn OrgRegistry> = Arc::new(HttpOrgRegistry::new(registry)?);
    Ok(match &registry.cache {
        Some(cache) => Arc::new(CachedOrgRegistry::from_config(http, cache)),
        None => http,
    })
}
