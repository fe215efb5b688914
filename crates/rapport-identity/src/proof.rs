use chrono::{DateTime, Utc};
use rapport_core::TrustError;
use rapport_crypto::{verify, Signature};
use serde::{Deserialize, Serialize};

use crate::did::Identifier;
use crate::identity::IdentityManager;

pub const PROOF_TYPE: &str = "Ed25519Signature2020";

/// Detached signature embedded in a signed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type")]
    pub proof_type: String,
    pub created: DateTime<Utc>,
    /// `<signer did>#<key fragment>`.
    pub verification_method: String,
    /// Base-58 Ed25519 signature over the record's signing payload.
    pub proof_value: String,
}

impl Proof {
    /// Sign `payload` as `signer`. The manager must be unlocked as `signer`.
    pub(crate) fn create(
        payload: &[u8],
        signer: &Identifier,
        identity: &IdentityManager,
    ) -> Result<Self, TrustError> {
        let current = identity.identifier()?;
        if current != signer {
            return Err(TrustError::CryptographicFailure(format!(
                "record signer {} does not match unlocked identity {}",
                signer, current
            )));
        }
        let signature = identity.sign(payload)?;
        Ok(Self {
            proof_type: PROOF_TYPE.to_string(),
            created: Utc::now(),
            verification_method: format!("{}#{}", signer, signer.key_fragment()),
            proof_value: signature.to_bs58(),
        })
    }

    /// Check the proof against the key embedded in `signer`.
    pub(crate) fn check(&self, payload: &[u8], signer: &Identifier) -> Result<(), TrustError> {
        if self.proof_type != PROOF_TYPE {
            return Err(TrustError::CryptographicFailure(format!(
                "unsupported proof type: {}",
                self.proof_type
            )));
        }
        let method_did = self
            .verification_method
            .split('#')
            .next()
            .unwrap_or_default();
        if method_did != signer.as_str() {
            return Err(TrustError::CryptographicFailure(
                "proof verification method does not belong to the signer".into(),
            ));
        }
        let signature = Signature::from_bs58(&self.proof_value)
            .map_err(|e| TrustError::CryptographicFailure(e.to_string()))?;
        let key = signer.to_public_key()?;
        verify(payload, &signature, &key)
            .map_err(|e| TrustError::CryptographicFailure(e.to_string()))
    }
}
