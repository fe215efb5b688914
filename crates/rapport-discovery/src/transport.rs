use async_trait::async_trait;
use rapport_core::TrustError;
use rapport_identity::{Attestation, Identifier, IdentityManager, PublicProfile, Verification};
use serde::{Deserialize, Serialize};

/// Verifications about one subject, published by that subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSet {
    pub id: Identifier,
    pub verifications: Vec<Verification>,
}

/// Attestations about one subject, published by that subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationSet {
    pub id: Identifier,
    pub attestations: Vec<Attestation>,
}

/// One row of the batch summary endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: Identifier,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub verification_count: usize,
    #[serde(default)]
    pub attestation_count: usize,
}

/// Publish/resolve transport for public trust data.
///
/// Publishing always signs as the unlocked identity and targets that
/// identity's own slot. Resolving returns `None` or an empty list when the
/// subject has published nothing; network problems are `TransportFailure`.
#[async_trait]
pub trait DiscoveryAdapter: Send + Sync {
    async fn publish_profile(
        &self,
        profile: &PublicProfile,
        identity: &IdentityManager,
    ) -> Result<(), TrustError>;

    async fn publish_verifications(
        &self,
        verifications: &[Verification],
        identity: &IdentityManager,
    ) -> Result<(), TrustError>;

    async fn publish_attestations(
        &self,
        attestations: &[Attestation],
        identity: &IdentityManager,
    ) -> Result<(), TrustError>;

    async fn resolve_profile(&self, id: &Identifier) -> Result<Option<PublicProfile>, TrustError>;

    async fn resolve_verifications(&self, id: &Identifier)
        -> Result<Vec<Verification>, TrustError>;

    async fn resolve_attestations(&self, id: &Identifier) -> Result<Vec<Attestation>, TrustError>;

    /// Names and counts for many identifiers in one call.
    ///
    /// `Ok(None)` means the transport has no batch path.
    async fn resolve_summaries(
        &self,
        _ids: &[Identifier],
    ) -> Result<Option<Vec<ProfileSummary>>, TrustError> {
        Ok(None)
    }
}
