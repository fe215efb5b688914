pub mod encoding;
pub mod encryption;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod mnemonic;
pub mod signing;

pub use encryption::{open, seal, SealedBox};
pub use envelope::{extract_payload, sign_envelope, verify_envelope, EnvelopeVerification};
pub use error::CryptoError;
pub use kdf::{derive_passphrase_key, derive_subkey, generate_salt};
pub use keys::{KeyPair, PublicKey};
pub use mnemonic::RecoveryPhrase;
pub use signing::{sign, verify, Signature};
