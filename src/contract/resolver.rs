//! Derives "signed" per party and "immutable" for the whole contract.
//!
//! Each verdict ORs independent signals: digital signatures, a scanned
//! paper copy, attached documents, and status. `status` can lag the other
//! fields, so no single signal is trusted alone. The combination leans
//! toward "signed" whenever any evidence exists.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::ContractDocumentsSource;
use crate::contract::{Contract, Party};

/// Where a resolved signed date came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignedDateSource {
    /// The party's own audit record.
    AuditRecord,
    /// Upload time of the scanned paper contract.
    ScanUpload,
    /// No recorded date; the resolution time was substituted.
    Fallback,
}

impl SignedDateSource {
    /// A fallback date is synthesized at read time and does not describe
    /// any real signing moment.
    pub fn is_fabricated(self) -> bool {
        matches!(self, Self::Fallback)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SignedDate {
    pub at: DateTime<Utc>,
    pub source: SignedDateSource,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PartySignatureState {
    pub party: Party,
    pub signed: bool,
    pub digital: bool,
    /// Present only when `signed` is true.
    pub signed_date: Option<SignedDate>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContractSignatureState {
    pub contract_id: String,
    pub client: PartySignatureState,
    pub broker: PartySignatureState,
    pub has_physical_document: bool,
    pub has_contract_documents: bool,
    pub immutable: bool,
}

impl ContractSignatureState {
    pub fn party(&self, party: Party) -> &PartySignatureState {
        match party {
            Party::Client => &self.client,
            Party::Broker => &self.broker,
        }
    }
}

pub struct ContractSignatureStateResolver {
    documents: Arc<dyn ContractDocumentsSource>,
}

impl ContractSignatureStateResolver {
    pub fn new(documents: Arc<dyn ContractDocumentsSource>) -> Self {
        Self { documents }
    }

    pub fn has_digital_signature(contract: &Contract, party: Party) -> bool {
        contract.signature(party).is_some()
    }

    pub fn has_physical_document(contract: &Contract) -> bool {
        contract.scanned_document().is_some()
    }

    /// Whether the contract has at least one attached document.
    ///
    /// A failed lookup counts as "no documents": an unreachable backend
    /// must never make a contract look signed.
    pub async fn has_contract_documents(&self, contract_id: &str) -> bool {
        match self.documents.list_contract_documents(contract_id).await {
            Ok(documents) => !documents.is_empty(),
            Err(e) => {
                tracing::warn!(
                    contract_id,
                    "Contract documents check failed, treating as none: {}",
                    e
                );
                false
            }
        }
    }

    pub async fn party_signed(&self, contract: &Contract, party: Party) -> bool {
        Self::has_digital_signature(contract, party)
            || Self::has_physical_document(contract)
            || self.has_contract_documents(&contract.id).await
    }

    pub fn contract_immutable(contract: &Contract) -> bool {
        (Self::has_digital_signature(contract, Party::Client)
            && Self::has_digital_signature(contract, Party::Broker))
            || Self::has_physical_document(contract)
            || contract.status.is_signing_terminal()
    }

    /// Audit timestamp, then scan upload time, then now.
    ///
    /// Only meaningful for a party already known to be signed.
    pub fn party_signed_date(contract: &Contract, party: Party) -> SignedDate {
        if let Some(audit) = contract.signature_audit(party) {
            return SignedDate {
                at: audit.timestamp,
                source: SignedDateSource::AuditRecord,
            };
        }
        if let Some(uploaded_at) = contract.scanned_document_uploaded_at {
            return SignedDate {
                at: uploaded_at,
                source: SignedDateSource::ScanUpload,
            };
        }
        tracing::debug!(
            contract_id = %contract.id,
            party = %party,
            "No recorded signing date, substituting the current time"
        );
        SignedDate {
            at: Utc::now(),
            source: SignedDateSource::Fallback,
        }
    }

    /// Full state for both parties. The documents store is queried once.
    pub async fn resolve(&self, contract: &Contract) -> ContractSignatureState {
        let has_physical_document = Self::has_physical_document(contract);
        let has_contract_documents = self.has_contract_documents(&contract.id).await;

        let party_state = |party: Party| {
            let digital = Self::has_digital_signature(contract, party);
            let signed = digital || has_physical_document || has_contract_documents;
            PartySignatureState {
                party,
                signed,
                digital,
                signed_date: signed.then(|| Self::party_signed_date(contract, party)),
            }
        };

        ContractSignatureState {
            contract_id: contract.id.clone(),
            client: party_state(Party::Client),
            broker: party_state(Party::Broker),
            has_physical_document,
            has_contract_documents,
            immutable: Self::contract_immutable(contract),
        }
    }
}
