//! # CodeCapsule Crypto
//!
//! The two encryption layers around a capsule payload.
//!
//! ## Encryption Model
//!
//! 1. **Client layer** ([`envelope`]): the payload is sealed under the
//!    owner's passphrase (Argon2id + ChaCha20-Poly1305). The passphrase never
//!    reaches the server.
//! 2. **Server layer** ([`server`]): the client envelope is wrapped once more
//!    under a key derived from a process-wide secret before it is persisted.
//!
//! The layers are independent and order-dependent: seal, then wrap; unwrap,
//! then open. Each has its own failure mode and key source.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use codecapsule_crypto::{seal, Payload, ServerLayer};
//!
//! let envelope = seal(&Payload::from("fn main() {}"), "correct horse battery").unwrap();
//!
//! let server = ServerLayer::from_env();
//! let at_rest = server.wrap(&envelope).unwrap();
//!
//! let back = server.unwrap(&at_rest).unwrap();
//! let payload = back.open("correct horse battery").unwrap();
//! ```

pub mod envelope;
pub mod error;
pub mod key;
pub mod server;

pub use envelope::{
    open, open_text, seal, seal_with, EnvelopeFormat, Payload, SealedEnvelope, ENVELOPE_PREFIX,
};
pub use error::{CryptoError, Result};
pub use key::{EncryptionKey, EncryptionNonce, KdfParams, Salt};
pub use server::{
    AtRestPayload, SecretSource, ServerLayer, ServerSecret, AT_REST_PREFIX, DEFAULT_SECRET_VAR,
};
