//! reqwest client for the back-office REST API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::api::health::BackendHealth;
use crate::api::{
    ContractDocumentsSource, ContractStore, ModifyAuthority, ModifyVerdict, RemoteAuditSink,
};
use crate::audit::AuditWireFormat;
use crate::config::ApiConfig;
use crate::contract::{Contract, ContractPatch};
use crate::error::ApiError;

const SIGNATURE_AUDIT_PATH: &str = "/api/contracts/signature-audit";
const ALREADY_SIGNED_CODE: &str = "CONTRACT_ALREADY_SIGNED";

/// Error body the backend attaches to refusals.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "error")]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Typed client for the contract and signature-audit endpoints.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<SecretString>,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        url::Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            timeout,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(
            config.base_url.clone(),
            config.auth_token.clone(),
            config.timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .request(method, self.url(path))
            .header("Accept", "application/json");
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body, turning non-2xx into
    /// [`ApiError::Status`].
    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let response = Self::check_status(endpoint, response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    async fn check_status(
        endpoint: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::CONFLICT {
            if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
                if parsed.code.as_deref() == Some(ALREADY_SIGNED_CODE) {
                    return Err(ApiError::ContractAlreadySigned {
                        message: parsed
                            .message
                            .unwrap_or_else(|| "contract is already signed".to_string()),
                    });
                }
            }
        }

        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    /// Reachability of the signature-audit endpoint, for `doctor`.
    ///
    /// Sends HEAD so the check never pulls the whole audit table.
    pub async fn health(&self) -> BackendHealth {
        match self
            .request(reqwest::Method::HEAD, SIGNATURE_AUDIT_PATH)
            .send()
            .await
        {
            Ok(response) => BackendHealth::answered(&self.base_url, response.status()),
            Err(e) => BackendHealth::failed(&self.base_url, &ApiError::from(e)),
        }
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.auth_token.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn contract_path(contract_id: &str, suffix: &str) -> String {
    format!(
        "/api/contracts/{}{}",
        urlencoding::encode(contract_id),
        suffix
    )
}

#[async_trait]
impl ContractStore for BackendClient {
    async fn get_contract(&self, contract_id: &str) -> Result<Contract, ApiError> {
        let path = contract_path(contract_id, "");
        self.send_json(&path, self.request(reqwest::Method::GET, &path))
            .await
    }

    async fn update_contract(
        &self,
        contract_id: &str,
        patch: &ContractPatch,
    ) -> Result<Contract, ApiError> {
        let path = contract_path(contract_id, "");
        let builder = self.request(reqwest::Method::PUT, &path).json(patch);
        let contract: Contract = self.send_json(&path, builder).await?;
        tracing::debug!(contract_id, "Contract updated");
        Ok(contract)
    }
}

#[async_trait]
impl ContractDocumentsSource for BackendClient {
    async fn list_contract_documents(
        &self,
        contract_id: &str,
    ) -> Result<Vec<serde_json::Value>, ApiError> {
        let path = contract_path(contract_id, "/documents");
        self.send_json(&path, self.request(reqwest::Method::GET, &path))
            .await
    }
}

#[async_trait]
impl ModifyAuthority for BackendClient {
    async fn can_modify(&self, contract_id: &str) -> Result<ModifyVerdict, ApiError> {
        let path = contract_path(contract_id, "/can-modify");
        self.send_json(&path, self.request(reqwest::Method::GET, &path))
            .await
    }
}

#[async_trait]
impl RemoteAuditSink for BackendClient {
    async fn post_audit(&self, payload: &AuditWireFormat) -> Result<(), ApiError> {
        let response = self
            .request(reqwest::Method::POST, SIGNATURE_AUDIT_PATH)
            .json(payload)
            .send()
            .await?;
        Self::check_status(SIGNATURE_AUDIT_PATH, response).await?;
        Ok(())
    }

    async fn list_audits(
        &self,
        contract_id: Option<&str>,
    ) -> Result<Vec<AuditWireFormat>, ApiError> {
        let path = match contract_id {
            Some(id) => format!(
                "{}?contractId={}",
                SIGNATURE_AUDIT_PATH,
                urlencoding::encode(id)
            ),
            None => SIGNATURE_AUDIT_PATH.to_string(),
        };
        self.send_json(SIGNATURE_AUDIT_PATH, self.request(reqwest::Method::GET, &path))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_base_url() {
        let err = BackendClient::new("not a url", None, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl { .. }));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client =
            BackendClient::new("http://localhost:8080/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(
            client.url(&contract_path("a/b", "/documents")),
            "http://localhost:8080/api/contracts/a%2Fb/documents"
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let client = BackendClient::new(
            "http://localhost:8080",
            Some(SecretString::from("super-secret".to_string())),
            Duration::from_secs(1),
        )
        .unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("authenticated: true"));
    }

    #[test]
    fn conflict_body_accepts_code_or_error_key() {
        let a: ErrorBody =
            serde_json::from_str(r#"{"code":"CONTRACT_ALREADY_SIGNED","message":"m"}"#).unwrap();
        let b: ErrorBody = serde_json::from_str(r#"{"error":"CONTRACT_ALREADY_SIGNED"}"#).unwrap();
        assert_eq!(a.code.as_deref(), Some(ALREADY_SIGNED_CODE));
        assert_eq!(b.code.as_deref(), Some(ALREADY_SIGNED_CODE));
        assert!(b.message.is_none());
    }
}
