use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::audit::PublicIpLookup;

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// Public IP lookup against an ipify-compatible endpoint returning
/// `{"ip": "..."}`.
pub struct HttpIpLookup {
    client: reqwest::Client,
    url: String,
}

impl HttpIpLookup {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PublicIpLookup for HttpIpLookup {
    async fn lookup(&self) -> Option<String> {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Public IP lookup failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!("Public IP lookup returned HTTP {}", response.status());
            return None;
        }
        match response.json::<IpResponse>().await {
            Ok(body) if !body.ip.trim().is_empty() => Some(body.ip.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Public IP lookup returned an unexpected body: {}", e);
                None
            }
        }
    }
}
