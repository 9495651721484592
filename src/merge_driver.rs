//! Host-side authoritative frame production.
//!
//! One participant — the host — runs the authoritative simulation. The
//! [`MergeDriver`] is its driver: a state machine over a single variable, the
//! frame currently awaiting input. When every participant's input for that
//! frame is present in the ledger, the driver merges them into one combined
//! input record, advances the authoritative simulation exactly one tick with
//! it, reads back the resulting state hash, and publishes the
//! merged-input-plus-hash record through
//! [`FrameLedger::push_full_sync_data`] — at which point it becomes the
//! authoritative truth every peer's resolver verifies against.
//!
//! Merging is also where clock drift is measured: each input record carries
//! the wall-clock instant its participant recorded it, and the spread of
//! those instants around their mean, smoothed per participant, becomes the
//! "ms ahead" estimate the self-throttle uses.
//!
//! The driver reacts to [`LedgerEvent::PlayerInput`] notifications delivered
//! by the session's tick loop. Inputs routinely arrive for frames beyond the
//! awaited one (the network does not pace itself to the merge); those are
//! simply left buffered until their turn.

use std::time::Duration;

use tracing::debug;

use crate::drift::DriftAverager;
use crate::error::{LockstepError, LockstepResult};
use crate::frame_info::{utc_timestamp_ticks, AuthorityFrame, OwnedInput, PlayerInputRecord};
use crate::ledger::{FrameLedger, LedgerEvent};
use crate::pool::{Recyclable, RecyclingPool};
use crate::{Frame, LockId, PlayerHandle, Simulation};

/// Window for per-participant clock-offset smoothing. Offsets drift slowly,
/// so the window is effectively "the whole session" and the sample cap does
/// the smoothing.
const OFFSET_WINDOW: Duration = Duration::from_secs(3600);

/// Number of offset samples retained per participant.
const OFFSET_SAMPLES: usize = 3;

/// 100-nanosecond ticks per millisecond.
const TICKS_PER_MS: i64 = 10_000;

/// Merges per-participant inputs into authoritative frames. Host-side only.
#[derive(Debug)]
pub struct MergeDriver<I: OwnedInput> {
    frame_awaiting_input: Frame,
    player_count: usize,
    player_locks: Vec<LockId>,
    /// Reference instant all participant timestamps are measured against.
    time_ref: i64,
    offset_averagers: Vec<DriftAverager>,
    input_pool: RecyclingPool<PlayerInputRecord<I>>,
    staged: Vec<PlayerInputRecord<I>>,
    publish_scratch: AuthorityFrame<I>,
}

impl<I: OwnedInput> MergeDriver<I> {
    /// Creates the driver, registering one retention lock per participant:
    /// the driver is a holder of every input until it has merged it.
    pub fn new(ledger: &mut FrameLedger<I>) -> LockstepResult<Self> {
        let player_count = ledger.player_count();
        let mut player_locks = Vec::with_capacity(player_count);
        let mut offset_averagers = Vec::with_capacity(player_count);
        for slot in 0..player_count {
            player_locks.push(ledger.register_player_lock(PlayerHandle::new(slot))?);
            offset_averagers.push(DriftAverager::with_max_samples(
                OFFSET_WINDOW,
                OFFSET_SAMPLES,
            ));
        }
        Ok(Self {
            frame_awaiting_input: Frame::FIRST,
            player_count,
            player_locks,
            time_ref: utc_timestamp_ticks(),
            offset_averagers,
            input_pool: RecyclingPool::new(),
            staged: Vec::with_capacity(player_count),
            publish_scratch: AuthorityFrame::default(),
        })
    }

    /// The frame the driver is waiting to complete. Starts at
    /// [`Frame::FIRST`] and only ever increases.
    #[must_use]
    pub fn frame_awaiting_input(&self) -> Frame {
        self.frame_awaiting_input
    }

    /// Feeds one drained ledger event to the driver. Only
    /// [`LedgerEvent::PlayerInput`] events matter; everything else is
    /// ignored. Returns the number of frames merged as a result.
    pub fn handle_event<S: Simulation<I>>(
        &mut self,
        event: LedgerEvent,
        ledger: &mut FrameLedger<I>,
        sim: &mut S,
    ) -> LockstepResult<u32> {
        match event {
            LedgerEvent::PlayerInput { frame, .. } => self.on_player_input(frame, ledger, sim),
            LedgerEvent::AuthorityInput { .. } => Ok(0),
        }
    }

    /// Reacts to a stored player input for `frame`.
    ///
    /// Inputs for frames other than the awaited one are ignored — they stay
    /// buffered in the ledger until the awaited frame completes. When the
    /// awaited frame has input from every participant, it is merged; merging
    /// repeats while the newly awaited frame is already complete, which
    /// happens when inputs arrived out of order.
    pub fn on_player_input<S: Simulation<I>>(
        &mut self,
        frame: Frame,
        ledger: &mut FrameLedger<I>,
        sim: &mut S,
    ) -> LockstepResult<u32> {
        if frame != self.frame_awaiting_input {
            return Ok(0);
        }
        let mut merged = 0;
        while ledger.has_input_for_all_players(self.frame_awaiting_input) {
            self.merge_awaited_frame(ledger, sim)?;
            merged += 1;
        }
        Ok(merged)
    }

    /// Merges the awaited frame. Caller has established that every
    /// participant's input is present.
    fn merge_awaited_frame<S: Simulation<I>>(
        &mut self,
        ledger: &mut FrameLedger<I>,
        sim: &mut S,
    ) -> LockstepResult<()> {
        let frame = self.frame_awaiting_input;

        // Copy every participant's input out of the ledger, dropping the
        // driver's retention as each copy lands.
        self.staged.clear();
        for slot in 0..self.player_count {
            let player = PlayerHandle::new(slot);
            let mut record = self.input_pool.acquire();
            if !ledger.try_get_player_input(player, frame, &mut record)? {
                // The all-present guard is the only correctness boundary;
                // a miss behind it is an internal inconsistency.
                return Err(LockstepError::MissingInput { player, frame });
            }
            self.staged.push(record);
            ledger.release_player_lock(player, frame, self.player_locks[slot])?;
        }

        // Union all input groups; accumulate timestamp deltas from the
        // reference instant.
        self.publish_scratch.reset();
        self.publish_scratch.merged.frame = frame;
        let mut delta_sum: i64 = 0;
        for record in &self.staged {
            delta_sum += record.applied_timestamp - self.time_ref;
            for group in &record.groups {
                self.publish_scratch.merged.push_group(*group);
            }
        }

        // Each participant's clock offset from the group mean, smoothed and
        // published as its "ms ahead" value.
        let mean_delta = delta_sum / self.player_count as i64;
        for slot in 0..self.player_count {
            let own_delta = self.staged[slot].applied_timestamp - self.time_ref;
            let ms_ahead = (mean_delta - own_delta) / TICKS_PER_MS;
            self.offset_averagers[slot].add_entry(ms_ahead as f32);
            let smoothed = self.offset_averagers[slot]
                .try_get_average()
                .unwrap_or(0.0);
            ledger.set_ms_ahead(PlayerHandle::new(slot), smoothed as i32)?;
        }

        for record in self.staged.drain(..) {
            self.input_pool.release(record);
        }

        // One authoritative tick, then publish input + resulting hash.
        sim.tick(&self.publish_scratch.merged);
        self.publish_scratch.checksum = sim.hash_at(frame);

        debug!(
            %frame,
            checksum = self.publish_scratch.checksum,
            "authoritative frame merged"
        );
        ledger.push_full_sync_data(&self.publish_scratch)?;
        self.publish_scratch.reset();
        self.frame_awaiting_input += 1;
        Ok(())
    }
}

// #########
// # TESTS #
// #########
