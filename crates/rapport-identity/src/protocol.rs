//! In-person challenge–response verification.
//!
//! The party displaying a code issues a [`VerificationChallenge`]; the party
//! scanning it decodes it with [`prepare_response`] and, after confirming
//! face-to-face, signs a [`Verification`] with [`confirm_and_respond`].
//! The scanner becomes `from`, the challenge issuer becomes `to`.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rapport_core::{ContactStatus, TrustError};
use rapport_crypto::encoding::{decode_base64, encode_base64};
use rapport_crypto::PublicKey;
use serde::{Deserialize, Serialize};

use crate::did::Identifier;
use crate::identity::IdentityManager;
use crate::verification::Verification;

/// Random bytes in a challenge nonce.
pub const NONCE_LEN: usize = 32;

/// Payload of a displayed verification code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationChallenge {
    pub issuer_id: Identifier,
    /// Base-58 raw Ed25519 key; must match `issuer_id`.
    pub issuer_public_key: String,
    pub issuer_name: String,
    /// Hex-encoded random nonce.
    pub nonce: String,
    pub created_at: DateTime<Utc>,
}

impl VerificationChallenge {
    /// Build a challenge for the unlocked identity.
    pub fn new(identity: &IdentityManager, display_name: &str) -> Result<Self, TrustError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        Ok(Self {
            issuer_id: identity.identifier()?.clone(),
            issuer_public_key: identity.public_key()?.to_bs58(),
            issuer_name: display_name.to_string(),
            nonce: hex::encode(nonce),
            created_at: Utc::now(),
        })
    }

    /// Text form: base64 of the UTF-8 JSON.
    pub fn encode(&self) -> Result<String, TrustError> {
        Ok(encode_base64(&serde_json::to_vec(self)?))
    }

    /// Decode and structurally validate a code.
    pub fn decode(code: &str) -> Result<Self, TrustError> {
        let bytes = decode_base64(code.trim()).map_err(|_| invalid_code())?;
        let challenge: Self = serde_json::from_slice(&bytes).map_err(|_| invalid_code())?;
        challenge.validate()?;
        Ok(challenge)
    }

    fn validate(&self) -> Result<(), TrustError> {
        let key = PublicKey::from_bs58(&self.issuer_public_key).map_err(|_| invalid_code())?;
        if key.as_bytes() != self.issuer_id.public_key_bytes() {
            return Err(invalid_code());
        }
        let nonce = hex::decode(&self.nonce).map_err(|_| invalid_code())?;
        if nonce.len() != NONCE_LEN {
            return Err(invalid_code());
        }
        Ok(())
    }
}

fn invalid_code() -> TrustError {
    TrustError::MalformedInput("invalid code".into())
}

/// Create the text code to display for the unlocked identity.
pub fn create_challenge(identity: &IdentityManager, display_name: &str) -> Result<String, TrustError> {
    let challenge = VerificationChallenge::new(identity, display_name)?;
    tracing::debug!(did = %challenge.issuer_id, "verification challenge created");
    challenge.encode()
}

/// Decode a scanned code. Fails with `MalformedInput("invalid code")`.
pub fn prepare_response(code: &str) -> Result<VerificationChallenge, TrustError> {
    VerificationChallenge::decode(code)
}

/// Sign "I met and confirm this identity" for the challenge issuer.
pub fn confirm_and_respond(
    challenge: &VerificationChallenge,
    identity: &IdentityManager,
) -> Result<Verification, TrustError> {
    let me = identity.identifier()?;
    if me == &challenge.issuer_id {
        return Err(TrustError::MalformedInput(
            "cannot verify your own code".into(),
        ));
    }
    let verification = Verification::new(me.clone(), challenge.issuer_id.clone()).issue(identity)?;
    tracing::info!(
        from = %verification.from,
        to = %verification.to,
        "verification signed"
    );
    Ok(verification)
}

/// Pairwise status between `my_id` and `peer_id` from a set of records.
///
/// Order-independent: only the presence of each direction matters.
pub fn get_status(
    my_id: &Identifier,
    peer_id: &Identifier,
    verifications: &[Verification],
) -> ContactStatus {
    let incoming = verifications
        .iter()
        .any(|v| &v.from == peer_id && &v.to == my_id);
    let outgoing = verifications
        .iter()
        .any(|v| &v.from == my_id && &v.to == peer_id);
    ContactStatus::from_directions(incoming, outgoing)
}
