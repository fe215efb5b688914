use chrono::{DateTime, SecondsFormat, Utc};
use rapport_core::TrustError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::did::Identifier;
use crate::identity::IdentityManager;
use crate::proof::Proof;

/// Signed claim by `from` about `to`.
///
/// Whether the subject accepts or hides an attestation is local metadata and
/// never part of the signed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub id: String,
    pub from: Identifier,
    pub to: Identifier,
    pub claim: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

impl Attestation {
    /// Create an unsigned attestation.
    pub fn new(issuer: Identifier, subject: Identifier, claim: impl Into<String>) -> Self {
        Self {
            id: format!("urn:uuid:{}", Uuid::now_v7()),
            from: issuer,
            to: subject,
            claim: claim.into(),
            tags: Vec::new(),
            context: None,
            created_at: Utc::now(),
            proof: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn signing_payload(&self) -> Result<Vec<u8>, TrustError> {
        let canonical = serde_json::json!({
            "id": self.id,
            "from": self.from.as_str(),
            "to": self.to.as_str(),
            "claim": self.claim,
            "tags": self.tags,
            "context": self.context,
            "createdAt": self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        Ok(serde_json::to_vec(&canonical)?)
    }

    /// Sign the attestation as the issuer.
    pub fn issue(mut self, identity: &IdentityManager) -> Result<Self, TrustError> {
        let payload = self.signing_payload()?;
        self.proof = Some(Proof::create(&payload, &self.from, identity)?);
        Ok(self)
    }

    pub fn verify_proof(&self) -> Result<(), TrustError> {
        let proof = self.proof.as_ref().ok_or_else(|| {
            TrustError::CryptographicFailure(format!("attestation {} has no proof", self.id))
        })?;
        proof.check(&self.signing_payload()?, &self.from)
    }

    /// Case-insensitive match on the claim text and tags.
    pub fn matches(&self, needle_lowercase: &str) -> bool {
        self.claim.to_lowercase().contains(needle_lowercase)
            || self
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(needle_lowercase))
    }
}
