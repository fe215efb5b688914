use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::did::Identifier;

/// Publicly discoverable profile. Always distributed inside a signed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Identifier,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PublicProfile {
    pub fn new(id: Identifier, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            bio: None,
            avatar: None,
            updated_at: Utc::now(),
        }
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Whether this profile supersedes `other`.
    pub fn supersedes(&self, other: &PublicProfile) -> bool {
        self.id == other.id && self.updated_at > other.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rapport_crypto::KeyPair;

    fn id() -> Identifier {
        Identifier::from_public_key(&KeyPair::generate().public_key())
    }

    #[test]
    fn test_profile_serde_camel_case() {
        let profile = PublicProfile::new(id(), "Ada").with_bio("builds looms");
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["bio"], "builds looms");
        assert!(json.get("avatar").is_none());

        let back: PublicProfile = serde_json::from_value(json).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_supersedes() {
        let subject = id();
        let old = PublicProfile::new(subject.clone(), "Old");
        let mut new = PublicProfile::new(subject, "New");
        new.updated_at = old.updated_at + Duration::seconds(5);

        assert!(new.supersedes(&old));
        assert!(!old.supersedes(&new));

        let stranger = PublicProfile::new(id(), "Other");
        assert!(!stranger.supersedes(&old));
    }
}
