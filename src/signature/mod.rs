//! Signature verification subsystem.
//!
//! # Data Flow
//! ```text
//! sign / x-sign header
//!     → exemption.rs (path prefix + exempt regexes)
//!     → verifier.rs
//!           allow list   (exact membership)
//!           envelope.rs  (AES-256-GCM, plaintext must carry the marker)
//!           digest.rs    (timestamped HMAC-SHA256)
//!     → replay store (one-time use)
//! ```

pub mod digest;
pub mod envelope;
pub mod exemption;
pub mod verifier;

pub use envelope::{AesGcmEnvelope, EnvelopeCipher, EnvelopeError};
pub use exemption::ExemptionList;
pub use verifier::{SignatureRejection, SignatureVerifier, VerificationConfig};
