use serde::{Deserialize, Serialize};
use std::fmt;

/// Pairwise verification status between the local identity and a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    /// Neither party has confirmed the other.
    None,
    /// The peer confirmed us; we have not confirmed them.
    Incoming,
    /// We confirmed the peer; they have not confirmed us.
    Outgoing,
    /// Both directions are present.
    Mutual,
}

impl ContactStatus {
    /// Combine the two directional facts into a status.
    pub fn from_directions(incoming: bool, outgoing: bool) -> Self {
        match (incoming, outgoing) {
            (true, true) => Self::Mutual,
            (true, false) => Self::Incoming,
            (false, true) => Self::Outgoing,
            (false, false) => Self::None,
        }
    }

    pub fn is_mutual(&self) -> bool {
        matches!(self, Self::Mutual)
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Incoming => write!(f, "incoming"),
            Self::Outgoing => write!(f, "outgoing"),
            Self::Mutual => write!(f, "mutual"),
        }
    }
}

/// The independently publishable parts of a participant's public data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncField {
    Profile,
    Verifications,
    Attestations,
}

impl SyncField {
    pub const ALL: [SyncField; 3] = [Self::Profile, Self::Verifications, Self::Attestations];
}

impl fmt::Display for SyncField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile => write!(f, "profile"),
            Self::Verifications => write!(f, "verifications"),
            Self::Attestations => write!(f, "attestations"),
        }
    }
}

/// Per-identifier dirty flags: a set flag means the field still has to be published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyFields {
    pub profile: bool,
    pub verifications: bool,
    pub attestations: bool,
}

impl DirtyFields {
    pub fn get(&self, field: SyncField) -> bool {
        match field {
            SyncField::Profile => self.profile,
            SyncField::Verifications => self.verifications,
            SyncField::Attestations => self.attestations,
        }
    }

    pub fn set(&mut self, field: SyncField, dirty: bool) {
        match field {
            SyncField::Profile => self.profile = dirty,
            SyncField::Verifications => self.verifications = dirty,
            SyncField::Attestations => self.attestations = dirty,
        }
    }

    /// Fields whose flag is set, in publish order.
    pub fn fields(&self) -> Vec<SyncField> {
        SyncField::ALL
            .into_iter()
            .filter(|field| self.get(*field))
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        !(self.profile || self.verifications || self.attestations)
    }
}

/// Out-of-band notification delivered by the push relay.
///
/// Events carry no data of their own; they only tell the receiver which
/// subject to re-resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "subject", rename_all = "camelCase")]
pub enum DiscoveryEvent {
    ProfileUpdated(String),
    VerificationAdded(String),
    AttestationAdded(String),
}

impl DiscoveryEvent {
    /// Identifier of the participant whose data changed.
    pub fn subject(&self) -> &str {
        match self {
            Self::ProfileUpdated(id) | Self::VerificationAdded(id) | Self::AttestationAdded(id) => {
                id
            }
        }
    }
}
