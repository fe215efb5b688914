//! HTTP implementation of [`DiscoveryAdapter`].
//!
//! `PUT`/`GET /<id>` (profile), `/<id>/v` (verifications) and `/<id>/a`
//! (attestations) carry signed envelopes. `POST /summaries` is optional.

use async_trait::async_trait;
use rapport_core::TrustError;
use rapport_crypto::verify_envelope;
use rapport_identity::{Attestation, Identifier, IdentityManager, PublicProfile, Verification};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::transport::{AttestationSet, DiscoveryAdapter, ProfileSummary, VerificationSet};

const VERIFICATIONS_SUFFIX: &str = "/v";
const ATTESTATIONS_SUFFIX: &str = "/a";

pub struct HttpDiscovery {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDiscovery {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Use a preconfigured client, e.g. one with request timeouts.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, id: &Identifier, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, id, suffix)
    }

    async fn put_signed<T: Serialize + Sync>(
        &self,
        suffix: &str,
        payload: &T,
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        let url = self.url(identity.identifier()?, suffix);
        let envelope = identity.sign_envelope(payload)?;

        let resp = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(envelope)
            .send()
            .await
            .map_err(transport_error)?;

        if resp.status().is_success() {
            tracing::debug!(url = %url, "published");
            Ok(())
        } else {
            Err(TrustError::TransportFailure(format!(
                "PUT {} failed (HTTP {})",
                url,
                resp.status()
            )))
        }
    }

    /// Fetch and verify the envelope at `id` + `suffix`. `None` on 404.
    async fn get_signed<T: DeserializeOwned>(
        &self,
        id: &Identifier,
        suffix: &str,
    ) -> Result<Option<T>, TrustError> {
        let url = self.url(id, suffix);
        let resp = self.client.get(&url).send().await.map_err(transport_error)?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = resp.text().await.map_err(transport_error)?;
                open_envelope(body.trim(), id).map(Some)
            }
            status => Err(TrustError::TransportFailure(format!(
                "GET {} failed (HTTP {})",
                url, status
            ))),
        }
    }
}

/// Verify `envelope` against the key embedded in `id`.
fn open_envelope<T: DeserializeOwned>(envelope: &str, id: &Identifier) -> Result<T, TrustError> {
    let key = id.to_public_key()?;
    verify_envelope::<T>(envelope, &key)
        .into_payload()
        .ok_or_else(|| {
            tracing::warn!(did = %id, "rejected envelope with invalid signature");
            TrustError::CryptographicFailure(format!("envelope for {} failed verification", id))
        })
}

fn check_embedded_id(embedded: &Identifier, expected: &Identifier) -> Result<(), TrustError> {
    if embedded == expected {
        Ok(())
    } else {
        Err(TrustError::CryptographicFailure(format!(
            "envelope for {} carries data for {}",
            expected, embedded
        )))
    }
}

fn transport_error(err: reqwest::Error) -> TrustError {
    TrustError::TransportFailure(err.to_string())
}

#[async_trait]
impl DiscoveryAdapter for HttpDiscovery {
    async fn publish_profile(
        &self,
        profile: &PublicProfile,
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        check_embedded_id(&profile.id, identity.identifier()?)?;
        self.put_signed("", profile, identity).await
    }

    async fn publish_verifications(
        &self,
        verifications: &[Verification],
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        let set = VerificationSet {
            id: identity.identifier()?.clone(),
            verifications: verifications.to_vec(),
        };
        self.put_signed(VERIFICATIONS_SUFFIX, &set, identity).await
    }

    async fn publish_attestations(
        &self,
        attestations: &[Attestation],
        identity: &IdentityManager,
    ) -> Result<(), TrustError> {
        let set = AttestationSet {
            id: identity.identifier()?.clone(),
            attestations: attestations.to_vec(),
        };
        self.put_signed(ATTESTATIONS_SUFFIX, &set, identity).await
    }

    async fn resolve_profile(&self, id: &Identifier) -> Result<Option<PublicProfile>, TrustError> {
        let profile: Option<PublicProfile> = self.get_signed(id, "").await?;
        if let Some(profile) = &profile {
            check_embedded_id(&profile.id, id)?;
        }
        Ok(profile)
    }

    async fn resolve_verifications(
        &self,
        id: &Identifier,
    ) -> Result<Vec<Verification>, TrustError> {
        match self
            .get_signed::<VerificationSet>(id, VERIFICATIONS_SUFFIX)
            .await?
        {
            Some(set) => {
                check_embedded_id(&set.id, id)?;
                Ok(set.verifications)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn resolve_attestations(&self, id: &Identifier) -> Result<Vec<Attestation>, TrustError> {
        match self
            .get_signed::<AttestationSet>(id, ATTESTATIONS_SUFFIX)
            .await?
        {
            Some(set) => {
                check_embedded_id(&set.id, id)?;
                Ok(set.attestations)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn resolve_summaries(
        &self,
        ids: &[Identifier],
    ) -> Result<Option<Vec<ProfileSummary>>, TrustError> {
        let url = format!("{}/summaries", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "ids": ids }))
            .send()
            .await
            .map_err(transport_error)?;

        match resp.status() {
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => Ok(None),
            status if status.is_success() => {
                let rows: Vec<ProfileSummary> = resp.json().await.map_err(transport_error)?;
                Ok(Some(rows))
            }
            status => Err(TrustError::TransportFailure(format!(
                "POST {} failed (HTTP {})",
                url, status
            ))),
        }
    }
}
