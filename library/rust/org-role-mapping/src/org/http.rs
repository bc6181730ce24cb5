use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::OrgRegistry;
use crate::config::RegistryConfig;
use crate::error::RegistryError;

/// 組織 API のレスポンス DTO。
#[derive(Debug, Deserialize)]
struct OrgResponse {
    id: i64,
}

/// 組織 API（`GET /api/orgs/name/{name}`, `GET /api/orgs/{id}`）へ HTTP で照会する
/// `OrgRegistry` 実装。404 は「存在しない」として扱う。
pub struct HttpOrgRegistry {
    http: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpOrgRegistry {
    /// 新しい `HttpOrgRegistry` を生成する。
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let base_url = Url::parse(&config.url).map_err(|e| {
            RegistryError::Unavailable(format!("invalid registry URL {:?}: {e}", config.url))
        })?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RegistryError::Unavailable(format!("registry URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET を送信し、404 の場合は `None` を返す。
    async fn get(&self, url: Url) -> Result<Option<reqwest::Response>, RegistryError> {
        let mut request = self.http.get(url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await.map_err(Self::map_request_error)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryError::Unavailable(format!("HTTP {status}: {body}")));
        }
        Ok(Some(resp))
    }

    /// `reqwest::Error` を `RegistryError` へ変換するヘルパー。
    fn map_request_error(e: reqwest::Error) -> RegistryError {
        if e.is_timeout() {
            RegistryError::Timeout(e.to_string())
        } else {
            RegistryError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl OrgRegistry for HttpOrgRegistry {
    async fn lookup_by_name(&self, name: &str) -> Result<Option<i64>, RegistryError> {
        let url = self.endpoint(&["api", "orgs", "name", name])?;
        let Some(resp) = self.get(url).await? else {
            return Ok(None);
        };
        let org: OrgResponse = resp
            .json()
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
        Ok(Some(org.id))
    }

    async fn exists(&self, org_id: i64) -> Result<bool, RegistryError> {
        let id = org_id.to_string();
        let url = self.endpoint(&["api", "orgs", &id])?;
        Ok(self.get(url).await?.is_some())
    }
}
