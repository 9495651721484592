//! The frame ledger: single source of truth for buffered per-frame data.
//!
//! Every subsystem in a session reads and writes frame data through one
//! [`FrameLedger`]: each participant's per-frame input as it arrives (locally
//! built or network-delivered), and the authoritative merged-input-plus-hash
//! record per frame. Records are pooled; what gates their reuse is the
//! retention mask described below.
//!
//! # Retention masks
//!
//! A frame record is needed by several subsystems for different spans of
//! time. Instead of cloning per consumer, each consumer registers a
//! [`LockId`] — a fresh single bit of a `u64` — once per session, and every
//! record enters the ledger retained under the OR of all bits registered for
//! its category at push time. Consumers clear their own bit when done with a
//! frame; the record is reset and returned to the pool exactly when its mask
//! reaches zero. Clearing a bit for a frame the ledger never saw fails fast
//! ([`LockstepError::LockNotHeld`]); clearing a bit for a frame that has
//! already been fully recycled is a no-op, since sweeping releases naturally
//! lag each other.
//!
//! # Notifications
//!
//! Pushes enqueue a [`LedgerEvent`] consumed by the session's tick loop via
//! [`FrameLedger::drain_events`] — same-tick, synchronous, in push order. The
//! merge driver reacts to player-input events; the transport typically reacts
//! to both kinds to schedule sends.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tracing::{debug, trace};

use crate::drift::DriftAverager;
use crate::error::{LockstepError, LockstepResult};
use crate::frame_info::{AuthorityFrame, OwnedInput, PlayerInputRecord};
use crate::interval_set::IntervalSet;
use crate::pool::RecyclingPool;
use crate::{Frame, LockId, PlayerHandle, MAX_LOCK_HOLDERS};

/// Sliding window for the per-participant "ahead by" averages that feed the
/// self-throttle. Lead is sampled once per render tick, so one second of
/// samples smooths jitter without hiding a real trend.
const AHEAD_BY_WINDOW: Duration = Duration::from_secs(1);

/// A notification raised synchronously by a ledger push.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A participant's input for a new frame was stored.
    PlayerInput {
        /// The participant whose input arrived.
        player: PlayerHandle,
        /// The frame the input is for.
        frame: Frame,
    },
    /// An authoritative merged+hashed frame was stored.
    AuthorityInput {
        /// The authoritative frame number.
        frame: Frame,
    },
}

/// Allocates the next holder bit: the first registrant gets bit 0, each
/// subsequent registrant the next-higher bit, until the register width runs
/// out.
fn register_bit(registration: &mut u64) -> LockstepResult<LockId> {
    if *registration == 0 {
        *registration = 1;
        return Ok(LockId::from_bit(1));
    }
    if registration.leading_zeros() == 0 {
        return Err(LockstepError::LockBitsExhausted {
            capacity: MAX_LOCK_HOLDERS,
        });
    }
    let widened = (*registration << 1) | 1;
    let bit = widened ^ *registration;
    *registration = widened;
    Ok(LockId::from_bit(bit))
}

/// Per-participant buffered state.
#[derive(Debug)]
struct PlayerLane<I: OwnedInput> {
    inputs: HashMap<Frame, PlayerInputRecord<I>>,
    locks: HashMap<Frame, u64>,
    /// Retained frames in push order; release sweeps walk it newest-first.
    locked_frames: Vec<Frame>,
    received: IntervalSet,
    registration: u64,
    ahead_by: DriftAverager,
    ms_ahead: Option<i32>,
}

impl<I: OwnedInput> PlayerLane<I> {
    fn new() -> Self {
        Self {
            inputs: HashMap::new(),
            locks: HashMap::new(),
            locked_frames: Vec::new(),
            received: IntervalSet::new(),
            registration: 0,
            ahead_by: DriftAverager::new(AHEAD_BY_WINDOW),
            ms_ahead: None,
        }
    }
}

/// Authoritative-frame buffered state.
#[derive(Debug)]
struct AuthorityLane<I: OwnedInput> {
    frames: HashMap<Frame, AuthorityFrame<I>>,
    locks: HashMap<Frame, u64>,
    locked_frames: Vec<Frame>,
    received: IntervalSet,
    registration: u64,
}

impl<I: OwnedInput> AuthorityLane<I> {
    fn new() -> Self {
        Self {
            frames: HashMap::new(),
            locks: HashMap::new(),
            locked_frames: Vec::new(),
            received: IntervalSet::new(),
            registration: 0,
        }
    }
}

/// The central store of per-frame player inputs and authoritative records,
/// with reference-counted retention.
///
/// One instance exists per client process and lives for the session. All
/// collaborating subsystems receive it by reference from the tick loop; there
/// is no shared or global state.
#[derive(Debug)]
pub struct FrameLedger<I: OwnedInput> {
    lanes: Vec<PlayerLane<I>>,
    authority: AuthorityLane<I>,
    input_pool: RecyclingPool<PlayerInputRecord<I>>,
    authority_pool: RecyclingPool<AuthorityFrame<I>>,
    events: VecDeque<LedgerEvent>,
}

impl<I: OwnedInput> FrameLedger<I> {
    /// Creates a ledger for a session with `player_count` participants.
    #[must_use]
    pub fn new(player_count: usize) -> Self {
        let mut lanes = Vec::with_capacity(player_count);
        lanes.resize_with(player_count, PlayerLane::new);
        Self {
            lanes,
            authority: AuthorityLane::new(),
            input_pool: RecyclingPool::new(),
            authority_pool: RecyclingPool::new(),
            events: VecDeque::new(),
        }
    }

    /// Number of participants in the session.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.lanes.len()
    }

    fn lane(&self, player: PlayerHandle) -> LockstepResult<&PlayerLane<I>> {
        self.lanes
            .get(player.as_usize())
            .ok_or(LockstepError::InvalidPlayerHandle {
                handle: player,
                player_count: self.lanes.len(),
            })
    }

    fn lane_mut(&mut self, player: PlayerHandle) -> LockstepResult<&mut PlayerLane<I>> {
        let player_count = self.lanes.len();
        self.lanes
            .get_mut(player.as_usize())
            .ok_or(LockstepError::InvalidPlayerHandle {
                handle: player,
                player_count,
            })
    }

    // ################
    // # REGISTRATION #
    // ################

    /// Registers a retention-lock holder for authoritative frames.
    ///
    /// Every authoritative record pushed afterwards is retained under this
    /// holder's bit (among others) until the holder releases it. Fails with
    /// [`LockstepError::LockBitsExhausted`] once the register is full.
    pub fn register_full_lock(&mut self) -> LockstepResult<LockId> {
        let lock = register_bit(&mut self.authority.registration)?;
        trace!(lock = %lock, "registered full-input lock");
        Ok(lock)
    }

    /// Registers a retention-lock holder for one participant's inputs.
    pub fn register_player_lock(&mut self, player: PlayerHandle) -> LockstepResult<LockId> {
        let lane = self.lane_mut(player)?;
        let lock = register_bit(&mut lane.registration)?;
        trace!(%player, lock = %lock, "registered player-input lock");
        Ok(lock)
    }

    // #################
    // # PLAYER INPUTS #
    // #################

    /// Stores a copy of `record` as `player`'s input for its frame.
    ///
    /// Inputs are packed redundantly into network messages to cover packet
    /// loss, so the same frame can arrive more than once; duplicates are
    /// accepted silently and change nothing. A fresh frame is copied into
    /// pooled storage, retained under the participant's full current holder
    /// mask, appended to the participant's interval tracker, and announced
    /// via [`LedgerEvent::PlayerInput`].
    pub fn push_player_input(
        &mut self,
        player: PlayerHandle,
        record: &PlayerInputRecord<I>,
    ) -> LockstepResult<()> {
        let frame = record.frame;
        let lane = self.lane(player)?;
        if lane.inputs.contains_key(&frame) {
            trace!(%player, %frame, "duplicate input ignored");
            return Ok(());
        }

        let mut pooled = self.input_pool.acquire();
        pooled.copy_from(record);

        let lane = self.lane_mut(player)?;
        lane.locks.insert(frame, lane.registration);
        lane.locked_frames.push(frame);
        lane.inputs.insert(frame, pooled);
        lane.received.insert(frame);

        trace!(%player, %frame, "player input stored");
        self.events
            .push_back(LedgerEvent::PlayerInput { player, frame });
        Ok(())
    }

    /// Copies `player`'s stored input for `frame` into `out`. Returns
    /// `Ok(false)` (leaving `out` untouched) if no record is retained.
    pub fn try_get_player_input(
        &self,
        player: PlayerHandle,
        frame: Frame,
        out: &mut PlayerInputRecord<I>,
    ) -> LockstepResult<bool> {
        let lane = self.lane(player)?;
        match lane.inputs.get(&frame) {
            Some(stored) => {
                out.copy_from(stored);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Clears `lock`'s retention bit on `player`'s input for `frame`,
    /// recycling the record if no bits remain.
    ///
    /// Releasing a frame the ledger never stored for this participant fails
    /// with [`LockstepError::LockNotHeld`]; releasing a frame that has
    /// already been fully recycled is a no-op.
    pub fn release_player_lock(
        &mut self,
        player: PlayerHandle,
        frame: Frame,
        lock: LockId,
    ) -> LockstepResult<()> {
        let lane = self.lane_mut(player)?;
        let remaining = match lane.locks.get_mut(&frame) {
            Some(mask) => {
                *mask &= !lock.bit();
                *mask
            }
            None => {
                if lane.received.contains(frame) {
                    // Fully released earlier; sweeps from other holders may
                    // still name it.
                    return Ok(());
                }
                return Err(LockstepError::LockNotHeld { frame, lock });
            }
        };

        if remaining == 0 {
            let record = lane
                .inputs
                .remove(&frame)
                .ok_or(LockstepError::FrameNotRetained { frame })?;
            lane.locks.remove(&frame);
            if let Some(index) = lane.locked_frames.iter().position(|&f| f == frame) {
                lane.locked_frames.remove(index);
            }
            self.input_pool.release(record);
            trace!(%player, %frame, "player input recycled");
        }
        Ok(())
    }

    /// Clears `lock`'s bit on every retained input of `player` with frame
    /// number at or below `ceiling`, newest-first.
    pub fn release_player_locks_at_or_below(
        &mut self,
        player: PlayerHandle,
        ceiling: Frame,
        lock: LockId,
    ) -> LockstepResult<()> {
        let lane = self.lane(player)?;
        let to_release: Vec<Frame> = lane
            .locked_frames
            .iter()
            .rev()
            .copied()
            .filter(|&f| f <= ceiling)
            .collect();
        for frame in to_release {
            self.release_player_lock(player, frame, lock)?;
        }
        Ok(())
    }

    /// Whether `player`'s input for `frame` was ever pushed, retained or not.
    pub fn input_ever_received(&self, player: PlayerHandle, frame: Frame) -> LockstepResult<bool> {
        Ok(self.lane(player)?.received.contains(frame))
    }

    /// The newest frame `n` such that `player`'s inputs for every frame
    /// `1..=n` have been pushed at least once. This is the frame number that
    /// is safe to acknowledge back to the sender.
    pub fn latest_consecutive_input_from(&self, player: PlayerHandle) -> LockstepResult<Frame> {
        Ok(self.lane(player)?.received.largest_consecutive_from_one())
    }

    /// Whether every participant's input for `frame` is currently retained.
    #[must_use]
    pub fn has_input_for_all_players(&self, frame: Frame) -> bool {
        self.lanes.iter().all(|lane| lane.inputs.contains_key(&frame))
    }

    // ########################
    // # AUTHORITATIVE FRAMES #
    // ########################

    /// Stores a copy of the authoritative record for its frame.
    ///
    /// Authoritative frames are produced exactly once per frame; pushing a
    /// frame number that is already present fails with
    /// [`LockstepError::DuplicateAuthorityFrame`]. The record is retained
    /// under the full-lock holder mask, appended to the authoritative
    /// interval tracker, and announced via [`LedgerEvent::AuthorityInput`].
    pub fn push_full_sync_data(&mut self, record: &AuthorityFrame<I>) -> LockstepResult<()> {
        let frame = record.frame();
        if self.authority.frames.contains_key(&frame) {
            return Err(LockstepError::DuplicateAuthorityFrame { frame });
        }

        let mut pooled = self.authority_pool.acquire();
        pooled.copy_from(record);

        self.authority.locks.insert(frame, self.authority.registration);
        self.authority.locked_frames.push(frame);
        self.authority.frames.insert(frame, pooled);
        self.authority.received.insert(frame);

        debug!(%frame, checksum = record.checksum, "authoritative frame stored");
        self.events.push_back(LedgerEvent::AuthorityInput { frame });
        Ok(())
    }

    /// Copies the authoritative record for `frame` into `out`. Returns
    /// `false` (leaving `out` untouched) if no record is retained.
    #[must_use]
    pub fn try_get_full_sync_data(&self, frame: Frame, out: &mut AuthorityFrame<I>) -> bool {
        match self.authority.frames.get(&frame) {
            Some(stored) => {
                out.copy_from(stored);
                true
            }
            None => false,
        }
    }

    /// The authoritative state hash for `frame`, if the record is retained.
    #[must_use]
    pub fn try_get_full_sync_hash(&self, frame: Frame) -> Option<u32> {
        self.authority.frames.get(&frame).map(|r| r.checksum)
    }

    /// Clears `lock`'s retention bit on the authoritative record for
    /// `frame`, recycling it if no bits remain. Same release semantics as
    /// [`release_player_lock`](Self::release_player_lock).
    pub fn release_full_lock(&mut self, frame: Frame, lock: LockId) -> LockstepResult<()> {
        let remaining = match self.authority.locks.get_mut(&frame) {
            Some(mask) => {
                *mask &= !lock.bit();
                *mask
            }
            None => {
                if self.authority.received.contains(frame) {
                    return Ok(());
                }
                return Err(LockstepError::LockNotHeld { frame, lock });
            }
        };

        if remaining == 0 {
            let record = self
                .authority
                .frames
                .remove(&frame)
                .ok_or(LockstepError::FrameNotRetained { frame })?;
            self.authority.locks.remove(&frame);
            if let Some(index) = self.authority.locked_frames.iter().position(|&f| f == frame) {
                self.authority.locked_frames.remove(index);
            }
            self.authority_pool.release(record);
            debug!(%frame, "authoritative frame recycled");
        }
        Ok(())
    }

    /// Clears `lock`'s bit on every retained authoritative record with frame
    /// number at or below `ceiling`, newest-first.
    pub fn release_full_lock_at_or_below(
        &mut self,
        ceiling: Frame,
        lock: LockId,
    ) -> LockstepResult<()> {
        let to_release: Vec<Frame> = self
            .authority
            .locked_frames
            .iter()
            .rev()
            .copied()
            .filter(|&f| f <= ceiling)
            .collect();
        for frame in to_release {
            self.release_full_lock(frame, lock)?;
        }
        Ok(())
    }

    /// Whether an authoritative record for `frame` was ever pushed.
    #[must_use]
    pub fn authority_ever_received(&self, frame: Frame) -> bool {
        self.authority.received.contains(frame)
    }

    /// The newest frame `n` such that authoritative records for every frame
    /// `1..=n` have been pushed.
    #[must_use]
    pub fn latest_consecutive_authority_input(&self) -> Frame {
        self.authority.received.largest_consecutive_from_one()
    }

    // ######################
    // # DRIFT BOOKKEEPING  #
    // ######################

    /// Publishes the merge driver's smoothed estimate of how many
    /// milliseconds `player`'s clock runs ahead of the group mean.
    pub fn set_ms_ahead(&mut self, player: PlayerHandle, ms: i32) -> LockstepResult<()> {
        self.lane_mut(player)?.ms_ahead = Some(ms);
        Ok(())
    }

    /// The last published clock-offset estimate for `player`, if any.
    #[must_use]
    pub fn try_get_ms_ahead(&self, player: PlayerHandle) -> Option<i32> {
        self.lanes.get(player.as_usize())?.ms_ahead
    }

    /// Feeds one "frames ahead" sample for `player` into its windowed
    /// average. Sampled by the self-throttle once per render tick.
    pub fn add_ahead_by(&mut self, player: PlayerHandle, value: f32) -> LockstepResult<()> {
        self.lane_mut(player)?.ahead_by.add_entry(value);
        Ok(())
    }

    /// The smoothed "frames ahead" value for `player`; `0.0` until samples
    /// exist.
    #[must_use]
    pub fn ahead_by(&self, player: PlayerHandle) -> f32 {
        self.lanes
            .get(player.as_usize())
            .and_then(|lane| lane.ahead_by.try_get_average())
            .unwrap_or(0.0)
    }

    // ##########
    // # EVENTS #
    // ##########

    /// Drains the pending push notifications, in push order.
    pub fn drain_events(&mut self) -> std::collections::vec_deque::Drain<'_, LedgerEvent> {
        self.events.drain(..)
    }
}

// #########
// # TESTS #
// #########

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod ledger_tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
    struct TestInput {
        owner: usize,
        value: i32,
    }

    impl OwnedInput for TestInput {
        fn owner(&self) -> PlayerHandle {
            PlayerHandle::new(self.owner)
        }

        fn blank_for(owner: PlayerHandle) -> Self {
            Self {
                owner: owner.as_usize(),
                value: 0,
            }
        }
    }

    const P0: PlayerHandle = PlayerHandle::new(0);
    const P1: PlayerHandle = PlayerHandle::new(1);

    fn input_record(frame: i32, owner: usize, value: i32) -> PlayerInputRecord<TestInput> {
        let mut record = PlayerInputRecord::new(Frame::new(frame));
        record.push_group(TestInput { owner, value });
        record.applied_timestamp = i64::from(frame) * 1_000;
        record
    }

    fn authority_record(frame: i32, checksum: u32) -> AuthorityFrame<TestInput> {
        let mut record = AuthorityFrame::default();
        record.merged.frame = Frame::new(frame);
        record.merged.push_group(TestInput { owner: 0, value: frame });
        record.checksum = checksum;
        record
    }

    #[test]
    fn lock_registration_allocates_doubling_bits() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(2);
        assert_eq!(ledger.register_full_lock().unwrap().bit(), 0b1);
        assert_eq!(ledger.register_full_lock().unwrap().bit(), 0b10);
        assert_eq!(ledger.register_full_lock().unwrap().bit(), 0b100);
        // Player categories allocate independently.
        assert_eq!(ledger.register_player_lock(P0).unwrap().bit(), 0b1);
        assert_eq!(ledger.register_player_lock(P1).unwrap().bit(), 0b1);
        assert_eq!(ledger.register_player_lock(P0).unwrap().bit(), 0b10);
    }

    #[test]
    fn lock_registration_exhausts_at_register_width() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        for _ in 0..MAX_LOCK_HOLDERS {
            ledger.register_full_lock().unwrap();
        }
        assert_eq!(
            ledger.register_full_lock(),
            Err(LockstepError::LockBitsExhausted {
                capacity: MAX_LOCK_HOLDERS
            })
        );
    }

    #[test]
    fn push_and_get_round_trips_all_fields() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(2);
        ledger.register_player_lock(P0).unwrap();
        let original = input_record(1, 0, 7);
        ledger.push_player_input(P0, &original).unwrap();

        let mut fetched = PlayerInputRecord::default();
        assert!(ledger.try_get_player_input(P0, Frame::new(1), &mut fetched).unwrap());
        assert_eq!(fetched, original);
    }

    #[test]
    fn get_unknown_frame_returns_false_and_leaves_scratch() {
        let ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        let mut scratch = input_record(9, 0, 9);
        let expected = scratch.clone();
        assert!(!ledger.try_get_player_input(P0, Frame::new(1), &mut scratch).unwrap());
        assert_eq!(scratch, expected);
    }

    #[test]
    fn duplicate_push_is_silent_and_notifies_once() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        let lock = ledger.register_player_lock(P0).unwrap();
        ledger.push_player_input(P0, &input_record(1, 0, 1)).unwrap();
        // Retransmitted copy with different payload: first record wins.
        ledger.push_player_input(P0, &input_record(1, 0, 99)).unwrap();

        let events: Vec<_> = ledger.drain_events().collect();
        assert_eq!(
            events,
            vec![LedgerEvent::PlayerInput {
                player: P0,
                frame: Frame::new(1)
            }]
        );

        let mut fetched = PlayerInputRecord::default();
        assert!(ledger.try_get_player_input(P0, Frame::new(1), &mut fetched).unwrap());
        assert_eq!(fetched.groups[0].value, 1);

        // A single release from the only holder recycles it; the duplicate
        // did not double-retain.
        ledger.release_player_lock(P0, Frame::new(1), lock).unwrap();
        assert!(!ledger.try_get_player_input(P0, Frame::new(1), &mut fetched).unwrap());
    }

    #[test]
    fn record_survives_until_last_holder_releases() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        let first = ledger.register_player_lock(P0).unwrap();
        let second = ledger.register_player_lock(P0).unwrap();
        let third = ledger.register_player_lock(P0).unwrap();
        ledger.push_player_input(P0, &input_record(1, 0, 5)).unwrap();

        let mut scratch = PlayerInputRecord::default();
        ledger.release_player_lock(P0, Frame::new(1), second).unwrap();
        assert!(ledger.try_get_player_input(P0, Frame::new(1), &mut scratch).unwrap());
        ledger.release_player_lock(P0, Frame::new(1), first).unwrap();
        assert!(ledger.try_get_player_input(P0, Frame::new(1), &mut scratch).unwrap());
        ledger.release_player_lock(P0, Frame::new(1), third).unwrap();
        assert!(!ledger.try_get_player_input(P0, Frame::new(1), &mut scratch).unwrap());
    }

    #[test]
    fn releasing_a_never_pushed_frame_fails() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        let lock = ledger.register_player_lock(P0).unwrap();
        assert_eq!(
            ledger.release_player_lock(P0, Frame::new(3), lock),
            Err(LockstepError::LockNotHeld {
                frame: Frame::new(3),
                lock
            })
        );
    }

    #[test]
    fn releasing_an_already_recycled_frame_is_a_noop() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        let lock = ledger.register_player_lock(P0).unwrap();
        ledger.push_player_input(P0, &input_record(1, 0, 1)).unwrap();
        ledger.release_player_lock(P0, Frame::new(1), lock).unwrap();
        // Fully recycled; a lagging sweep naming it again is fine.
        assert!(ledger.release_player_lock(P0, Frame::new(1), lock).is_ok());
    }

    #[test]
    fn sweep_releases_only_frames_at_or_below_ceiling() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        let lock = ledger.register_player_lock(P0).unwrap();
        for frame in 1..=5 {
            ledger.push_player_input(P0, &input_record(frame, 0, frame)).unwrap();
        }
        ledger
            .release_player_locks_at_or_below(P0, Frame::new(3), lock)
            .unwrap();

        let mut scratch = PlayerInputRecord::default();
        for frame in 1..=3 {
            assert!(!ledger
                .try_get_player_input(P0, Frame::new(frame), &mut scratch)
                .unwrap());
        }
        for frame in 4..=5 {
            assert!(ledger
                .try_get_player_input(P0, Frame::new(frame), &mut scratch)
                .unwrap());
        }
    }

    #[test]
    fn interval_queries_delegate_to_tracker() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        ledger.register_player_lock(P0).unwrap();
        for frame in [2, 1, 4, 2, 1] {
            ledger.push_player_input(P0, &input_record(frame, 0, 0)).unwrap();
        }
        assert_eq!(
            ledger.latest_consecutive_input_from(P0).unwrap(),
            Frame::new(2)
        );
        assert!(ledger.input_ever_received(P0, Frame::new(4)).unwrap());
        assert!(!ledger.input_ever_received(P0, Frame::new(3)).unwrap());
    }

    #[test]
    fn has_input_for_all_players_requires_every_lane() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(2);
        ledger.push_player_input(P0, &input_record(1, 0, 0)).unwrap();
        assert!(!ledger.has_input_for_all_players(Frame::new(1)));
        ledger.push_player_input(P1, &input_record(1, 1, 0)).unwrap();
        assert!(ledger.has_input_for_all_players(Frame::new(1)));
    }

    #[test]
    fn duplicate_authority_frame_is_fatal() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        ledger.register_full_lock().unwrap();
        ledger.push_full_sync_data(&authority_record(1, 0xA)).unwrap();
        assert_eq!(
            ledger.push_full_sync_data(&authority_record(1, 0xB)),
            Err(LockstepError::DuplicateAuthorityFrame {
                frame: Frame::new(1)
            })
        );
    }

    #[test]
    fn authority_hash_and_data_queries() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        let lock = ledger.register_full_lock().unwrap();
        ledger.push_full_sync_data(&authority_record(1, 0xC0FFEE)).unwrap();

        assert_eq!(ledger.try_get_full_sync_hash(Frame::new(1)), Some(0xC0FFEE));
        assert_eq!(ledger.try_get_full_sync_hash(Frame::new(2)), None);
        assert_eq!(ledger.latest_consecutive_authority_input(), Frame::new(1));
        assert!(ledger.authority_ever_received(Frame::new(1)));

        let mut scratch = AuthorityFrame::default();
        assert!(ledger.try_get_full_sync_data(Frame::new(1), &mut scratch));
        assert_eq!(scratch.checksum, 0xC0FFEE);

        ledger.release_full_lock(Frame::new(1), lock).unwrap();
        assert!(!ledger.try_get_full_sync_data(Frame::new(1), &mut scratch));
        // Ever-received is independent of retention.
        assert!(ledger.authority_ever_received(Frame::new(1)));
    }

    #[test]
    fn authority_sweep_respects_ceiling() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        let lock = ledger.register_full_lock().unwrap();
        for frame in 1..=4 {
            ledger
                .push_full_sync_data(&authority_record(frame, frame as u32))
                .unwrap();
        }
        ledger
            .release_full_lock_at_or_below(Frame::new(2), lock)
            .unwrap();

        let mut scratch = AuthorityFrame::default();
        assert!(!ledger.try_get_full_sync_data(Frame::new(1), &mut scratch));
        assert!(!ledger.try_get_full_sync_data(Frame::new(2), &mut scratch));
        assert!(ledger.try_get_full_sync_data(Frame::new(3), &mut scratch));
        assert!(ledger.try_get_full_sync_data(Frame::new(4), &mut scratch));
    }

    #[test]
    fn drift_bookkeeping_round_trips() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(2);
        assert_eq!(ledger.try_get_ms_ahead(P0), None);
        ledger.set_ms_ahead(P0, 12).unwrap();
        assert_eq!(ledger.try_get_ms_ahead(P0), Some(12));

        assert_eq!(ledger.ahead_by(P1), 0.0);
        ledger.add_ahead_by(P1, 3.0).unwrap();
        ledger.add_ahead_by(P1, 5.0).unwrap();
        assert!((ledger.ahead_by(P1) - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_handle_is_rejected() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(1);
        let bad = PlayerHandle::new(1);
        assert!(matches!(
            ledger.register_player_lock(bad),
            Err(LockstepError::InvalidPlayerHandle { .. })
        ));
        assert!(matches!(
            ledger.push_player_input(bad, &input_record(1, 1, 0)),
            Err(LockstepError::InvalidPlayerHandle { .. })
        ));
    }

    #[test]
    fn events_are_drained_in_push_order() {
        let mut ledger: FrameLedger<TestInput> = FrameLedger::new(2);
        ledger.push_player_input(P0, &input_record(1, 0, 0)).unwrap();
        ledger.push_player_input(P1, &input_record(1, 1, 0)).unwrap();
        ledger.push_full_sync_data(&authority_record(1, 1)).unwrap();

        let events: Vec<_> = ledger.drain_events().collect();
        assert_eq!(
            events,
            vec![
                LedgerEvent::PlayerInput {
                    player: P0,
                    frame: Frame::new(1)
                },
                LedgerEvent::PlayerInput {
                    player: P1,
                    frame: Frame::new(1)
                },
                LedgerEvent::AuthorityInput {
                    frame: Frame::new(1)
                },
            ]
        );
        assert_eq!(ledger.drain_events().count(), 0);
    }
}
