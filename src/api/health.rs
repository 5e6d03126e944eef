//! Backend reachability report used by `doctor`.

use std::error::Error as _;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Typed backend health state for operator surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendHealthState {
    Healthy,
    InvalidUrl,
    DnsFailure,
    ConnectFailure,
    Timeout,
    AuthFailure,
    HttpFailure,
}

impl BackendHealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::InvalidUrl => "invalid_url",
            Self::DnsFailure => "dns_failure",
            Self::ConnectFailure => "connect_failure",
            Self::Timeout => "timeout",
            Self::AuthFailure => "auth_failure",
            Self::HttpFailure => "http_failure",
        }
    }

    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// State implied by a status the backend answered with. Any 4xx other
    /// than an auth refusal still proves the server is reachable.
    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::AuthFailure
        } else if status.is_server_error() {
            Self::HttpFailure
        } else {
            Self::Healthy
        }
    }

    /// Classify a failed [`BackendClient`](crate::api::BackendClient) call.
    pub fn from_api_error(error: &ApiError) -> Self {
        match error {
            ApiError::InvalidUrl { .. } => Self::InvalidUrl,
            ApiError::Status { status, .. } => StatusCode::from_u16(*status)
                .map(Self::from_status)
                .unwrap_or(Self::HttpFailure),
            // The backend answered with a domain refusal.
            ApiError::ContractAlreadySigned { .. } => Self::Healthy,
            ApiError::InvalidResponse { .. } => Self::HttpFailure,
            ApiError::Http(error) => Self::from_transport(error),
        }
    }

    fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_builder() {
            Self::InvalidUrl
        } else if error.is_connect() {
            if names_dns_failure(error) {
                Self::DnsFailure
            } else {
                Self::ConnectFailure
            }
        } else {
            Self::HttpFailure
        }
    }
}

/// hyper reports resolver failures as "dns error: failed to lookup address"
/// somewhere down the source chain.
fn names_dns_failure(error: &reqwest::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = error.source();
    while let Some(err) = current {
        let text = err.to_string().to_ascii_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        current = err.source();
    }
    false
}

/// Reachability of the configured backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    pub url: String,
    pub state: BackendHealthState,
    pub detail: String,
    pub http_status: Option<u16>,
}

impl BackendHealth {
    pub fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }

    /// The backend returned a response with `status`.
    pub fn answered(url: &str, status: StatusCode) -> Self {
        Self {
            url: url.to_string(),
            state: BackendHealthState::from_status(status),
            detail: format!("HTTP {}", status.as_u16()),
            http_status: Some(status.as_u16()),
        }
    }

    /// The backend could not be reached, or the client could not be built.
    pub fn failed(url: &str, error: &ApiError) -> Self {
        let http_status = match error {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        };
        Self {
            url: url.to_string(),
            state: BackendHealthState::from_api_error(error),
            detail: error.to_string(),
            http_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::api::BackendClient;

    #[test]
    fn health_state_labels_are_stable() {
        assert_eq!(BackendHealthState::Healthy.as_str(), "healthy");
        assert_eq!(BackendHealthState::DnsFailure.as_str(), "dns_failure");
        assert_eq!(
            serde_json::to_value(BackendHealthState::AuthFailure).unwrap(),
            serde_json::json!("auth_failure")
        );
    }

    #[test]
    fn answered_status_maps_to_state() {
        for (status, expected) in [
            (StatusCode::OK, BackendHealthState::Healthy),
            (StatusCode::METHOD_NOT_ALLOWED, BackendHealthState::Healthy),
            (StatusCode::UNAUTHORIZED, BackendHealthState::AuthFailure),
            (StatusCode::FORBIDDEN, BackendHealthState::AuthFailure),
            (StatusCode::BAD_GATEWAY, BackendHealthState::HttpFailure),
        ] {
            let health = BackendHealth::answered("http://backend", status);
            assert_eq!(health.state, expected, "{status}");
            assert_eq!(health.http_status, Some(status.as_u16()));
        }
    }

    #[test]
    fn client_errors_map_to_state() {
        let invalid = ApiError::InvalidUrl {
            url: "::".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert_eq!(
            BackendHealthState::from_api_error(&invalid),
            BackendHealthState::InvalidUrl
        );

        let forbidden = ApiError::Status {
            endpoint: "/api/contracts/signature-audit".to_string(),
            status: 403,
            body: String::new(),
        };
        let health = BackendHealth::failed("http://backend", &forbidden);
        assert_eq!(health.state, BackendHealthState::AuthFailure);
        assert_eq!(health.http_status, Some(403));

        let signed = ApiError::ContractAlreadySigned {
            message: "signed".to_string(),
        };
        assert!(BackendHealthState::from_api_error(&signed).is_healthy());

        let garbled = ApiError::InvalidResponse {
            endpoint: "/api/contracts/c-1".to_string(),
            reason: "expected value".to_string(),
        };
        assert_eq!(
            BackendHealthState::from_api_error(&garbled),
            BackendHealthState::HttpFailure
        );
    }

    #[tokio::test]
    async fn closed_port_is_a_connect_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            BackendClient::new(format!("http://{addr}"), None, Duration::from_secs(2)).unwrap();
        let health = client.health().await;
        assert_eq!(health.state, BackendHealthState::ConnectFailure);
        assert!(health.http_status.is_none());
    }

    #[tokio::test]
    async fn silent_backend_is_a_timeout() {
        // Connections queue in the backlog but nothing ever answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client =
            BackendClient::new(format!("http://{addr}"), None, Duration::from_millis(150))
                .unwrap();
        assert_eq!(client.health().await.state, BackendHealthState::Timeout);
        drop(listener);
    }
}
