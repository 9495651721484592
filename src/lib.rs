//! # Fortress Lockstep
//!
//! A deterministic-lockstep rollback core for real-time multiplayer games.
//! It keeps two or more participants' simulations in bit-exact agreement
//! despite network latency and jitter, using local speculative execution,
//! authoritative correction, and state-hash verification.
//!
//! The crate owns the frame synchronization machinery and nothing else: the
//! deterministic simulation, the transport, and the view/interpolation layer
//! stay on the caller's side of the [`Simulation`], [`FrameCodec`] and
//! [`ViewSink`] seams.
//!
//! # Control flow per local tick
//!
//! 1. The [`InputBuilder`] records local input for the frame about to be
//!    simulated (offset by a fixed input delay) and pushes it into the
//!    [`FrameLedger`].
//! 2. The local simulation advances speculatively using
//!    [`InputBuilder::predicted_input`] — the local participant's real input
//!    plus a prediction for every remote participant.
//! 3. The [`RollbackResolver`] checks newly arrived authoritative frames
//!    against locally computed state hashes, rewinding and deterministically
//!    re-simulating on a mismatch.
//! 4. On the host, the [`MergeDriver`] merges the per-participant inputs for
//!    the next pending frame, advances the authoritative simulation, and
//!    publishes the merged input plus state hash back into the ledger.
//! 5. The serialization caches ([`PlayerInputCache`], [`AuthorityCache`])
//!    hand the transport pre-encoded payloads for anything not yet
//!    acknowledged, and release ledger retention as acknowledgments advance.
//!
//! Everything runs on one cooperative simulation thread; inbound network
//! payloads are decoded and pushed into the ledger between ticks by the
//! caller's boundary layer.
//!
//! # Retention
//!
//! Buffered frame records are shared by several subsystems with different
//! lifetimes (the merge driver is done with an input once merged; the
//! serialization cache must hold it until the peer acknowledges it; the input
//! builder needs local inputs until the resolver confirms the frame). Each
//! subsystem registers a [`LockId`] — a single bit in the frame's retention
//! mask — and a record is recycled exactly when the last bit clears. See
//! [`FrameLedger`] for the rules.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use codec::{BincodeFrameCodec, FrameCodec};
pub use drift::DriftAverager;
pub use error::{LockstepError, LockstepResult};
pub use frame_clock::FrameClock;
pub use frame_info::{AuthorityFrame, MergedInput, OwnedInput, PlayerInputRecord};
pub use input_builder::prediction::{BlankPrediction, PredictionStrategy, RepeatLastConfirmed};
pub use input_builder::InputBuilder;
pub use interval_set::IntervalSet;
pub use ledger::{FrameLedger, LedgerEvent};
pub use merge_driver::MergeDriver;
pub use pool::{ByteBuf, Recyclable, RecyclingPool};
pub use resolver::{RollbackResolver, ThrottleConfig};
pub use serialize_cache::{AuthorityCache, PlayerInputCache};

pub mod codec;
pub mod drift;
pub mod error;
pub mod frame_clock;
pub mod frame_info;
pub mod input_builder;
pub mod interval_set;
pub mod ledger;
pub mod merge_driver;
pub mod pool;
pub mod prelude;
pub mod resolver;
pub mod serialize_cache;

// #############
// # CONSTANTS #
// #############

/// Number of distinct retention-lock holders each lock category supports.
///
/// Holder ids are single bits of a `u64` mask; registering the 65th holder in
/// a category fails with [`LockstepError::LockBitsExhausted`]. Sessions use a
/// handful of holders per category (merge driver, serialization cache, input
/// builder, resolver), so hitting the ceiling indicates leaked registrations.
pub const MAX_LOCK_HOLDERS: u32 = u64::BITS;

// #############
// #   TYPES   #
// #############

/// A frame is a single step of game execution.
///
/// Frames are the fundamental unit of time in lockstep networking: one
/// discrete simulation tick, identified by a strictly increasing integer.
/// Valid frame numbers start at 1; [`Frame::ZERO`] is the "nothing yet"
/// state reported before the first frame exists (for example by
/// [`FrameLedger::latest_consecutive_authority_input`] before any
/// authoritative frame arrived).
///
/// # Type Safety
///
/// `Frame` is a newtype wrapper around `i32` that provides:
/// - Clear semantic meaning (frames vs arbitrary integers)
/// - Arithmetic operations for frame calculations
/// - Compile-time prevention of accidentally mixing frames with other integers
///
/// # Examples
///
/// ```
/// use fortress_lockstep::Frame;
///
/// let first = Frame::new(1);
/// assert!(first.is_valid());
/// assert!(!Frame::ZERO.is_valid());
///
/// let next = first + 1;
/// assert_eq!(next.as_i32(), 2);
/// assert!(next > first);
/// ```
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Frame(i32);

impl Frame {
    /// The pre-session frame number: one less than the first valid frame.
    /// Reported by "latest consecutive" queries before anything arrived.
    pub const ZERO: Frame = Frame(0);

    /// The first valid frame of a session.
    pub const FIRST: Frame = Frame(1);

    /// Creates a new `Frame` from an `i32` value.
    ///
    /// Note: this does not validate the frame number. Use
    /// [`Frame::is_valid()`] to check whether it denotes an actual frame.
    #[inline]
    #[must_use]
    pub const fn new(frame: i32) -> Self {
        Frame(frame)
    }

    /// Returns the underlying `i32` value.
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Returns `true` if this frame denotes an actual simulation frame
    /// (frame numbers start at 1).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 1
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Arithmetic operations

impl std::ops::Add<i32> for Frame {
    type Output = Frame;

    #[inline]
    fn add(self, rhs: i32) -> Self::Output {
        Frame(self.0 + rhs)
    }
}

impl std::ops::AddAssign<i32> for Frame {
    #[inline]
    fn add_assign(&mut self, rhs: i32) {
        self.0 += rhs;
    }
}

impl std::ops::Sub<i32> for Frame {
    type Output = Frame;

    #[inline]
    fn sub(self, rhs: i32) -> Self::Output {
        Frame(self.0 - rhs)
    }
}

impl std::ops::Sub<Frame> for Frame {
    type Output = i32;

    #[inline]
    fn sub(self, rhs: Frame) -> Self::Output {
        self.0 - rhs.0
    }
}

// Conversion traits

impl From<i32> for Frame {
    #[inline]
    fn from(value: i32) -> Self {
        Frame(value)
    }
}

impl From<Frame> for i32 {
    #[inline]
    fn from(frame: Frame) -> Self {
        frame.0
    }
}

// Comparison with i32 for convenience

impl PartialEq<i32> for Frame {
    #[inline]
    fn eq(&self, other: &i32) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<i32> for Frame {
    #[inline]
    fn partial_cmp(&self, other: &i32) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

/// A unique identifier for a participant in a session.
///
/// Participant slots are dense, starting at 0; a session with `n` players
/// uses handles `0..n`. Handles identify the same participant on every peer.
///
/// # Examples
///
/// ```
/// use fortress_lockstep::PlayerHandle;
///
/// let local = PlayerHandle::new(0);
/// assert!(local.is_valid_for(2));
/// assert!(!PlayerHandle::new(2).is_valid_for(2));
/// ```
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct PlayerHandle(usize);

impl PlayerHandle {
    /// Creates a new `PlayerHandle` from a `usize` slot index.
    #[inline]
    #[must_use]
    pub const fn new(handle: usize) -> Self {
        PlayerHandle(handle)
    }

    /// Returns the underlying `usize` value.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns `true` if this handle is a valid slot for a session with the
    /// given number of players.
    #[inline]
    #[must_use]
    pub const fn is_valid_for(self, player_count: usize) -> bool {
        self.0 < player_count
    }
}

impl std::fmt::Display for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for PlayerHandle {
    #[inline]
    fn from(value: usize) -> Self {
        PlayerHandle(value)
    }
}

impl From<PlayerHandle> for usize {
    #[inline]
    fn from(handle: PlayerHandle) -> Self {
        handle.0
    }
}

/// A retention-lock holder id: a single bit of a frame record's retention
/// mask.
///
/// Obtained from [`FrameLedger::register_full_lock`] or
/// [`FrameLedger::register_player_lock`], held for the session's lifetime,
/// and passed back on every release. A frame record is recycled exactly when
/// every registered holder has cleared its bit for that frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LockId(u64);

impl LockId {
    #[inline]
    pub(crate) const fn from_bit(bit: u64) -> Self {
        LockId(bit)
    }

    /// The raw single-bit mask value.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// #############
// #  TRAITS   #
// #############

/// The deterministic simulation engine this core drives.
///
/// The engine owns all gameplay state and the serialization of it; this crate
/// only ever asks it to advance by exactly one tick, report a state hash, or
/// rewind. Determinism is the engine's contract: ticking from the same state
/// with the same merged input must produce the same state (and therefore the
/// same hash) on every peer, every time.
pub trait Simulation<I: OwnedInput> {
    /// Advances the simulation by exactly one tick using the merged input for
    /// the next frame.
    fn tick(&mut self, input: &MergedInput<I>);

    /// The 32-bit, order-sensitive state hash of the state *after* `frame`
    /// was simulated. Must be available for every frame the engine has not
    /// yet been told is acknowledged.
    fn hash_at(&self, frame: Frame) -> u32;

    /// Rewinds committed state to exactly the state after `frame`.
    fn restore_to(&mut self, frame: Frame);

    /// The next frame number the engine would simulate (one past the latest
    /// simulated frame; [`Frame::FIRST`] before anything ran).
    fn next_frame(&self) -> Frame;
}

/// The view/interpolation layer fed by the resolver.
///
/// Receives committed frames in increasing order with no gaps, and a reset
/// notice when a rollback discards previously pushed frames at or after the
/// given frame.
pub trait ViewSink {
    /// A frame was (re-)committed by the simulation.
    fn push_frame(&mut self, frame: Frame);

    /// A rollback invalidated pushed frames at or after `frame`; the view
    /// should discard them and await re-pushed replacements.
    fn reset_to_frame(&mut self, frame: Frame);
}

// #########
// # TESTS #
// #########

#[cfg(test)]
mod frame_tests {
    use super::*;

    #[test]
    fn zero_frame_is_not_valid() {
        assert!(!Frame::ZERO.is_valid());
        assert!(Frame::FIRST.is_valid());
        assert_eq!(Frame::FIRST - 1, Frame::ZERO);
    }

    #[test]
    fn frame_arithmetic() {
        let frame = Frame::new(5);
        assert_eq!(frame + 1, Frame::new(6));
        assert_eq!(frame - 1, Frame::new(4));
        assert_eq!(Frame::new(8) - frame, 3);

        let mut advancing = frame;
        advancing += 1;
        assert_eq!(advancing, Frame::new(6));
    }

    #[test]
    fn frame_compares_with_i32() {
        assert!(Frame::new(3) == 3);
        assert!(Frame::new(3) < 4);
        assert!(Frame::new(3) > 2);
    }

    #[test]
    fn frame_display_is_bare_number() {
        assert_eq!(Frame::new(42).to_string(), "42");
    }

    #[test]
    fn frame_roundtrips_through_i32() {
        let frame: Frame = 17.into();
        let raw: i32 = frame.into();
        assert_eq!(raw, 17);
    }
}

#[cfg(test)]
mod player_handle_tests {
    use super::*;

    #[test]
    fn handle_validity_is_bounded_by_player_count() {
        assert!(PlayerHandle::new(0).is_valid_for(1));
        assert!(PlayerHandle::new(1).is_valid_for(2));
        assert!(!PlayerHandle::new(2).is_valid_for(2));
    }

    #[test]
    fn handle_display_is_bare_number() {
        assert_eq!(PlayerHandle::new(3).to_string(), "3");
    }

    #[test]
    fn handle_roundtrips_through_usize() {
        let handle: PlayerHandle = 5usize.into();
        let raw: usize = handle.into();
        assert_eq!(raw, 5);
    }
}

#[cfg(test)]
mod lock_id_tests {
    use super::*;

    #[test]
    fn lock_id_exposes_its_bit() {
        let lock = LockId::from_bit(0b100);
        assert_eq!(lock.bit(), 4);
    }

    #[test]
    fn lock_id_displays_as_hex() {
        assert_eq!(LockId::from_bit(0b10).to_string(), "0x2");
    }
}
