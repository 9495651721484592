//! Error types for the lockstep core.
//!
//! Defines [`LockstepError`], the single error enum returned across the crate's
//! fallible operations.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::{Frame, LockId, PlayerHandle};

/// Convenience alias for results produced by this crate.
pub type LockstepResult<T> = Result<T, LockstepError>;

/// This enum contains all error conditions this library can report. Most API
/// functions return a [`LockstepResult`].
///
/// With one exception, every variant signals a broken invariant in the caller
/// or in this library — retrying is never meaningful. The exception is
/// [`Desync`](LockstepError::Desync): an authoritative state-hash disagreement
/// that survived a rollback replay. That is a session-level outcome, not a
/// bug, and callers should check [`is_desync`](LockstepError::is_desync) to
/// route it to a "connection lost" surface instead of a crash report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockstepError {
    /// The simulation state hash disagreed with the authoritative hash even
    /// after rewinding and re-simulating with the authoritative input. The
    /// session cannot recover.
    Desync {
        /// The frame on which the replayed hash still disagreed.
        frame: Frame,
        /// Hash computed by the local simulation after the replay.
        local_checksum: u32,
        /// Hash carried by the authoritative frame record.
        authority_checksum: u32,
    },
    /// A frame-ordered operation was attempted out of sequence, e.g. starting
    /// an input frame that does not line up with the builder's next expected
    /// frame.
    FrameOutOfSequence {
        /// The frame the component expected to handle next.
        expected: Frame,
        /// The frame the caller supplied.
        actual: Frame,
    },
    /// A required input record was absent for a frame where presence had
    /// already been established (or is a precondition of the call).
    MissingInput {
        /// The participant whose input was missing.
        player: PlayerHandle,
        /// The frame for which input was missing.
        frame: Frame,
    },
    /// Data was requested for a frame whose record has already been released
    /// and recycled. The requester held no retention lock on it.
    FrameNotRetained {
        /// The frame that is no longer available.
        frame: Frame,
    },
    /// A retention lock release was issued for a frame that never carried the
    /// releasing holder's bit.
    LockNotHeld {
        /// The frame being released.
        frame: Frame,
        /// The holder id that issued the release.
        lock: LockId,
    },
    /// An authoritative frame was pushed for a frame number that already has
    /// one. Authoritative frames are append-only and produced exactly once.
    DuplicateAuthorityFrame {
        /// The duplicated frame number.
        frame: Frame,
    },
    /// All retention-lock holder bits for a category are taken. This means
    /// subsystem instances are being leaked, since each registers once for
    /// the session's lifetime.
    LockBitsExhausted {
        /// Number of distinct holders the register supports.
        capacity: u32,
    },
    /// A participant slot outside the session's player count was supplied.
    InvalidPlayerHandle {
        /// The offending handle.
        handle: PlayerHandle,
        /// Number of participants in the session.
        player_count: usize,
    },
    /// Serialization or deserialization of a frame record failed.
    SerializationError {
        /// A description of what failed to serialize/deserialize.
        context: String,
    },
}

impl LockstepError {
    /// Whether this error is the unrecoverable desync outcome, as opposed to
    /// a programming-invariant violation.
    #[must_use]
    pub fn is_desync(&self) -> bool {
        matches!(self, LockstepError::Desync { .. })
    }
}

impl Display for LockstepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockstepError::Desync {
                frame,
                local_checksum,
                authority_checksum,
            } => {
                write!(
                    f,
                    "Desync at frame {}: local checksum {:#010x} != authoritative checksum {:#010x} after rollback replay",
                    frame, local_checksum, authority_checksum
                )
            }
            LockstepError::FrameOutOfSequence { expected, actual } => {
                write!(
                    f,
                    "Frame out of sequence: expected {}, got {}",
                    expected, actual
                )
            }
            LockstepError::MissingInput { player, frame } => {
                write!(f, "Missing input for player {} at frame {}", player, frame)
            }
            LockstepError::FrameNotRetained { frame } => {
                write!(f, "Frame {} has already been released and recycled", frame)
            }
            LockstepError::LockNotHeld { frame, lock } => {
                write!(
                    f,
                    "Lock {} released for frame {} it never retained",
                    lock, frame
                )
            }
            LockstepError::DuplicateAuthorityFrame { frame } => {
                write!(f, "Authoritative frame {} was already published", frame)
            }
            LockstepError::LockBitsExhausted { capacity } => {
                write!(
                    f,
                    "All {} retention-lock holder bits are registered; a subsystem is leaking registrations",
                    capacity
                )
            }
            LockstepError::InvalidPlayerHandle {
                handle,
                player_count,
            } => {
                write!(
                    f,
                    "Invalid player handle {}: session has {} players",
                    handle, player_count
                )
            }
            LockstepError::SerializationError { context } => {
                write!(f, "Serialization error: {}", context)
            }
        }
    }
}

impl Error for LockstepError {}

// #########
// # TESTS #
// #########
