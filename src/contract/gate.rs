//! Modification gate for contract lifecycle actions.
//!
//! The backend's `can-modify` verdict is authoritative. Local state can
//! only add refusals on top of it, never lift one.

use std::sync::Arc;

use serde::Serialize;

use crate::api::{ModifyAuthority, ModifyVerdict};
use crate::contract::resolver::ContractSignatureStateResolver;
use crate::contract::{Contract, ContractStatus, Party};
use crate::error::GateError;

/// Actions that change a contract after creation.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContractAction {
    ReUpload,
    ReSign,
    DeleteDocument,
    Edit,
}

impl ContractAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReUpload => "re_upload",
            Self::ReSign => "re_sign",
            Self::DeleteDocument => "delete_document",
            Self::Edit => "edit",
        }
    }
}

pub struct ContractLifecycleGate {
    authority: Arc<dyn ModifyAuthority>,
}

impl ContractLifecycleGate {
    pub fn new(authority: Arc<dyn ModifyAuthority>) -> Self {
        Self { authority }
    }

    /// Ask the backend whether the contract may change.
    ///
    /// A transport failure yields [`GateError::VerdictUnavailable`], which
    /// callers must treat as a refusal.
    pub async fn can_modify(&self, contract_id: &str) -> Result<ModifyVerdict, GateError> {
        self.authority
            .can_modify(contract_id)
            .await
            .map_err(|source| GateError::VerdictUnavailable {
                contract_id: contract_id.to_string(),
                source,
            })
    }

    /// Display projection: signed on screen.
    pub fn is_digitally_signed(contract: &Contract) -> bool {
        contract.status == ContractStatus::SignedDigital
            || (ContractSignatureStateResolver::has_digital_signature(
                contract,
                Party::Client,
            ) && ContractSignatureStateResolver::has_digital_signature(
                contract,
                Party::Broker,
            ))
    }

    /// Display projection: signed on paper and scanned.
    pub fn is_physically_signed(contract: &Contract) -> bool {
        contract.status == ContractStatus::SignedPhysical
            || ContractSignatureStateResolver::has_physical_document(contract)
    }

    /// Authorize `action` on `contract`.
    ///
    /// Returns the backend verdict on success.
    pub async fn authorize(
        &self,
        contract: &Contract,
        action: ContractAction,
    ) -> Result<ModifyVerdict, GateError> {
        let verdict = self.can_modify(&contract.id).await?;
        if !verdict.can_modify {
            let reason = verdict
                .reason
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "The backend does not allow changes to this contract".to_string());
            tracing::info!(
                contract_id = %contract.id,
                action = action.as_str(),
                "Modification refused by backend: {}",
                reason
            );
            return Err(GateError::Refused {
                contract_id: contract.id.clone(),
                reason,
            });
        }

        if ContractSignatureStateResolver::contract_immutable(contract) {
            tracing::info!(
                contract_id = %contract.id,
                action = action.as_str(),
                "Modification refused: contract is already signed"
            );
            return Err(GateError::Refused {
                contract_id: contract.id.clone(),
                reason: "Contract is already signed".to_string(),
            });
        }

        Ok(verdict)
    }
}
