use chrono::{DateTime, SecondsFormat, Utc};
use rapport_core::TrustError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::did::Identifier;
use crate::identity::IdentityManager;
use crate::proof::Proof;

/// Which side of a verification an identity is on.
///
/// The confirmer is the party who scanned a challenge and signed; the subject
/// is the party whose challenge was scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationRole {
    Confirmer,
    Subject,
}

/// Signed, immutable assertion "`from` met and confirms `to`".
///
/// Trust changes are expressed as newer records; records are never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub id: String,
    /// The confirming party and signer.
    pub from: Identifier,
    /// The party being confirmed.
    pub to: Identifier,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

impl Verification {
    /// Create an unsigned record.
    pub fn new(confirmer: Identifier, subject: Identifier) -> Self {
        Self {
            id: format!("urn:uuid:{}", Uuid::now_v7()),
            from: confirmer,
            to: subject,
            timestamp: Utc::now(),
            location: None,
            proof: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn confirmer(&self) -> &Identifier {
        &self.from
    }

    pub fn subject(&self) -> &Identifier {
        &self.to
    }

    /// Role of `id` in this record, if it takes part at all.
    pub fn role_of(&self, id: &Identifier) -> Option<VerificationRole> {
        if &self.from == id {
            Some(VerificationRole::Confirmer)
        } else if &self.to == id {
            Some(VerificationRole::Subject)
        } else {
            None
        }
    }

    /// Deterministic JSON of every field except the proof.
    pub fn signing_payload(&self) -> Result<Vec<u8>, TrustError> {
        let canonical = serde_json::json!({
            "id": self.id,
            "from": self.from.as_str(),
            "to": self.to.as_str(),
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "location": self.location,
        });
        Ok(serde_json::to_vec(&canonical)?)
    }

    /// Sign the record as the confirmer.
    pub fn issue(mut self, identity: &IdentityManager) -> Result<Self, TrustError> {
        let payload = self.signing_payload()?;
        self.proof = Some(Proof::create(&payload, &self.from, identity)?);
        Ok(self)
    }

    /// Check the proof against the key embedded in `from`.
    pub fn verify_proof(&self) -> Result<(), TrustError> {
        let proof = self.proof.as_ref().ok_or_else(|| {
            TrustError::CryptographicFailure(format!("verification {} has no proof", self.id))
        })?;
        proof.check(&self.signing_payload()?, &self.from)
    }
}
