use anyhow::{Context, Result};
use org_role_mapping::{config, MappingSpec};

use crate::cli::CheckArgs;

/// 設定ファイルを読み込み、マッピングルールを含めて検証する。
pub fn run(args: &CheckArgs) -> Result<()> {
    let cfg = config::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    config::validate(&cfg)?;

    let spec = MappingSpec::parse(&cfg.org_mapping)?;
    println!("{}", summary(&spec));
    Ok(())
}

fn summary(spec: &MappingSpec) -> String {
    match spec {
        MappingSpec::Unconfigured => "OK: 組織ロールマッピングは無効です".to_string(),
        MappingSpec::Current(mapping) => format!(
            "OK: {} rule(s), org_attribute_path={}",
            mapping.rules.len(),
            mapping.claims_path
        ),
        MappingSpec::Legacy(projection) => {
            format!("OK: org_roles_attribute_path={}", projection.query)
        }
    }
}
