//! Object model for the content-addressed store
//!
//! - `blob`: raw file contents
//! - `tree`: directory snapshots
//! - `commit`: history records
//! - `object`: the shared framing and hashing contract
//! - `object_id`: SHA-1 identifiers
//! - `object_type`: the object kind tag

pub mod blob;
pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;

/// Length of an object id in hexadecimal characters.
pub const OBJECT_ID_LENGTH: usize = 40;

/// Length of the abbreviated object id used in human output.
pub const SHORT_OID_LENGTH: usize = 7;

/// Minimum prefix length accepted when resolving abbreviated object ids.
pub const MIN_OID_PREFIX: usize = 4;
