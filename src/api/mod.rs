//! Back-office REST API: the seams the signing subsystem calls through and
//! the reqwest client that implements them.

mod client;
pub mod health;
mod ip_lookup;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audit::AuditWireFormat;
use crate::contract::{Contract, ContractPatch};
use crate::error::ApiError;

pub use self::client::BackendClient;
pub use self::health::{BackendHealth, BackendHealthState};
pub use self::ip_lookup::HttpIpLookup;

/// Backend-side copy of the signature event log.
#[async_trait]
pub trait RemoteAuditSink: Send + Sync {
    /// `POST /api/contracts/signature-audit`
    async fn post_audit(&self, payload: &AuditWireFormat) -> Result<(), ApiError>;

    /// `GET /api/contracts/signature-audit[?contractId=..]`
    async fn list_audits(&self, contract_id: Option<&str>)
    -> Result<Vec<AuditWireFormat>, ApiError>;
}

/// Uploaded contract documents. Only their presence is consumed.
#[async_trait]
pub trait ContractDocumentsSource: Send + Sync {
    async fn list_contract_documents(
        &self,
        contract_id: &str,
    ) -> Result<Vec<serde_json::Value>, ApiError>;
}

/// Authoritative source of the "may this contract still change" verdict.
#[async_trait]
pub trait ModifyAuthority: Send + Sync {
    async fn can_modify(&self, contract_id: &str) -> Result<ModifyVerdict, ApiError>;
}

/// Contract reads and partial updates.
#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn get_contract(&self, contract_id: &str) -> Result<Contract, ApiError>;

    async fn update_contract(
        &self,
        contract_id: &str,
        patch: &ContractPatch,
    ) -> Result<Contract, ApiError>;
}

/// Response of `GET /api/contracts/{id}/can-modify`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModifyVerdict {
    pub can_modify: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ModifyVerdict {
    pub fn allowed() -> Self {
        Self {
            can_modify: true,
            reason: None,
        }
    }

    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            can_modify: false,
            reason: Some(reason.into()),
        }
    }
}
