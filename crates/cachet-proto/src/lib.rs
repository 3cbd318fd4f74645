//! Cachet wire vocabulary.
//!
//! Everything that crosses the network boundary is described here: host and
//! subject identifiers, timestamps, the opaque typed [`Payload`] an
//! application hands to the envelope codec, the tagged CBOR tuple codec each
//! envelope layer is written with, the outer [`frame`] (magic + version) and
//! the structured [`ErrorPayload`] a host returns when it can open an
//! envelope but not accept its contents.
//!
//! This crate has no cryptography in it. It guarantees structural validity
//! only: known tags, exact lengths, no trailing bytes, size limits.
//!
//! # Layout
//!
//! ```text
//! [magic "CACH"][version] CBOR[ tag, (fields...) ]
//!                                      │
//!                                      └─ each layer nests the next one as
//!                                         an opaque byte string field
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod frame;
pub mod ids;
pub mod payload;
pub mod reply;
pub mod wire;

pub use errors::{ProtocolError, Result};
pub use ids::{HostId, SubjectId, Timestamp};
pub use payload::{Payload, PayloadTag};
pub use reply::ErrorPayload;
pub use wire::Tag;

/// Maximum size of any encoded layer or decompressed payload (16 MB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;
