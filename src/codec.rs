//! Frame-record serialization seam.
//!
//! The wire format of input payloads belongs to the integration, not to this
//! core: a game may pack component groups into flatbuffers, bit-packed
//! structs, or anything else its transport speaks. The [`FrameCodec`] trait
//! is the seam the serialization caches encode through; the only requirements
//! are that encoding is deterministic and decoding reverses it exactly, since
//! the same record must produce the same bytes on every peer and every
//! resend.
//!
//! [`BincodeFrameCodec`] is the provided default. It uses bincode's standard
//! configuration with fixed-size integer encoding: fixed-size integers give
//! deterministic payload sizes, and the configuration is centralized here so
//! every encode and decode in the process agrees on it.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{LockstepError, LockstepResult};
use crate::frame_info::{AuthorityFrame, OwnedInput, PlayerInputRecord};

/// Encodes and decodes frame records for transport.
///
/// `serialize_*` appends the encoded record to `out` (callers hand in pooled
/// buffers); `deserialize_*` must reconstruct a record field-for-field equal
/// to the one encoded. Determinism is part of the contract: equal records
/// must encode to equal bytes.
pub trait FrameCodec<I: OwnedInput> {
    /// Appends the encoded form of a participant input record to `out`.
    fn serialize_input(
        &self,
        record: &PlayerInputRecord<I>,
        out: &mut Vec<u8>,
    ) -> LockstepResult<()>;

    /// Decodes a participant input record.
    fn deserialize_input(&self, bytes: &[u8]) -> LockstepResult<PlayerInputRecord<I>>;

    /// Appends the encoded form of an authoritative frame record to `out`.
    fn serialize_authority(
        &self,
        record: &AuthorityFrame<I>,
        out: &mut Vec<u8>,
    ) -> LockstepResult<()>;

    /// Decodes an authoritative frame record.
    fn deserialize_authority(&self, bytes: &[u8]) -> LockstepResult<AuthorityFrame<I>>;
}

// The bincode configuration used for all frame payloads.
//
// `standard()` with `fixed_int_encoding()`: fixed-size integers ensure
// deterministic message sizes and skip variable-length encoding overhead for
// the small integers frame records are full of.
fn config() -> impl bincode::config::Config {
    bincode::config::standard().with_fixed_int_encoding()
}

fn encode_append<T: Serialize>(value: &T, out: &mut Vec<u8>) -> LockstepResult<()> {
    bincode::serde::encode_into_std_write(value, out, config())
        .map(|_| ())
        .map_err(|e| LockstepError::SerializationError {
            context: e.to_string(),
        })
}

fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> LockstepResult<T> {
    bincode::serde::decode_from_slice(bytes, config())
        .map(|(value, _)| value)
        .map_err(|e| LockstepError::SerializationError {
            context: e.to_string(),
        })
}

/// The default codec: bincode with fixed-size integer encoding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BincodeFrameCodec;

impl<I: OwnedInput> FrameCodec<I> for BincodeFrameCodec {
    fn serialize_input(
        &self,
        record: &PlayerInputRecord<I>,
        out: &mut Vec<u8>,
    ) -> LockstepResult<()> {
        encode_append(record, out)
    }

    fn deserialize_input(&self, bytes: &[u8]) -> LockstepResult<PlayerInputRecord<I>> {
        decode_value(bytes)
    }

    fn serialize_authority(
        &self,
        record: &AuthorityFrame<I>,
        out: &mut Vec<u8>,
    ) -> LockstepResult<()> {
        encode_append(record, out)
    }

    fn deserialize_authority(&self, bytes: &[u8]) -> LockstepResult<AuthorityFrame<I>> {
        decode_value(bytes)
    }
}

// #########
// # TESTS #
// #########
