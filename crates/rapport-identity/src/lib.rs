//! Rapport Identity Layer
//!
//! - Self-certifying `did:key` identifiers
//! - Identity creation and unlock from a recovery phrase, passphrase-sealed seed storage
//! - Signed verification and attestation records
//! - In-person challenge–response verification and pairwise status derivation
//! - Mutual-verification transition tracking
//! - Append-only trust log

pub mod attestation;
pub mod did;
pub mod identity;
pub mod mutual;
pub mod profile;
pub mod proof;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod trust_log;
pub mod verification;

pub use attestation::Attestation;
pub use did::{identifier_from_public_key, identifier_to_public_key, Identifier};
pub use identity::{CreatedIdentity, IdentityManager};
pub use mutual::{watch_mutual, MutualTransitionTracker};
pub use profile::PublicProfile;
pub use proof::Proof;
pub use protocol::{
    confirm_and_respond, create_challenge, get_status, prepare_response, VerificationChallenge,
};
pub use session::{SessionEvent, SessionState, SessionStateMachine, VerificationSession};
pub use storage::{MemorySeedStore, SealedSeed, SeedStore};
pub use trust_log::TrustLog;
pub use verification::{Verification, VerificationRole};
