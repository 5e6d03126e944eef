//! Signature capture workflow for one party on one contract.
//!
//! Ties the collector, the event log and the contract store together:
//! refuse frozen contracts, capture the audit record, log the event, and
//! optionally write the signature back onto the contract.

use std::sync::Arc;

use crate::api::ContractStore;
use crate::audit::{
    AuditFingerprintCollector, SignatureAuditRecord, SignatureEventLog, SignatureEventLogEntry,
    SignatureEventType,
};
use crate::contract::{Contract, ContractPatch, ContractSignatureStateResolver, Party};
use crate::error::{StoreError, WorkflowError};

/// Result of capturing one signature action.
#[derive(Debug, Clone)]
pub struct SignatureCapture {
    pub party: Party,
    /// Data URL as drawn; empty when the signature was cleared.
    pub image: String,
    pub record: SignatureAuditRecord,
    pub entry: SignatureEventLogEntry,
}

impl SignatureCapture {
    pub fn event_type(&self) -> SignatureEventType {
        self.entry.event_type
    }
}

pub struct SigningWorkflow {
    collector: AuditFingerprintCollector,
    events: Arc<SignatureEventLog>,
    contracts: Arc<dyn ContractStore>,
}

impl SigningWorkflow {
    pub fn new(
        collector: AuditFingerprintCollector,
        events: Arc<SignatureEventLog>,
        contracts: Arc<dyn ContractStore>,
    ) -> Self {
        Self {
            collector,
            events,
            contracts,
        }
    }

    pub fn events(&self) -> &SignatureEventLog {
        &self.events
    }

    /// Capture and log a signature action. An empty `image` records a clear.
    pub async fn record(
        &self,
        contract: &Contract,
        party: Party,
        image: &str,
        width: u32,
        height: u32,
    ) -> Result<SignatureCapture, WorkflowError> {
        if ContractSignatureStateResolver::contract_immutable(contract) {
            return Err(WorkflowError::ContractSigned {
                contract_id: contract.id.clone(),
            });
        }

        let record = self.collector.create_audit_data(image, width, height).await;
        let event_type = SignatureEventType::classify(contract.signature(party), image);
        let entry = self
            .events
            .log_event(record.clone(), event_type, Some(&contract.id), party)
            .await?;

        tracing::info!(
            contract_id = %contract.id,
            party = %party,
            event = event_type.as_str(),
            signature_length = record.signature_data.signature_length,
            "Signature event recorded"
        );

        Ok(SignatureCapture {
            party,
            image: image.to_string(),
            record,
            entry,
        })
    }

    /// Write the captured signature and its audit record onto the contract.
    pub async fn persist(
        &self,
        contract_id: &str,
        capture: &SignatureCapture,
    ) -> Result<Contract, WorkflowError> {
        let patch = ContractPatch::signature(capture.party, &capture.image, &capture.record)
            .map_err(StoreError::from)?;
        let updated = self.contracts.update_contract(contract_id, &patch).await?;
        tracing::info!(
            contract_id,
            party = %capture.party,
            "Signature persisted on contract"
        );
        Ok(updated)
    }
}
