//! Local input recording and remote input prediction.
//!
//! The [`InputBuilder`] is where locally-read input enters the system. It
//! builds one [`PlayerInputRecord`] per simulation frame, stamped with the
//! local wall clock and pushed into the [`FrameLedger`] for the local
//! participant — but scheduled `D` frames in the future, where `D` is the
//! input delay. The delay buys the network a head start: by the time the
//! simulation reaches the frame, the input has usually already crossed the
//! wire, so remote peers never need to predict the near past.
//!
//! The builder also answers the other half of speculative execution: what to
//! feed the simulation for a frame whose remote inputs have not arrived.
//! [`InputBuilder::predicted_input`] merges the local participant's *actual*
//! recorded input with one predicted group per remote participant,
//! synthesized by a [`PredictionStrategy`] from that participant's last
//! confirmed input (maintained via
//! [`InputBuilder::update_last_inputs`] as authoritative frames arrive).
//!
//! The builder registers a retention lock on the local participant's inputs:
//! a rollback may need to replay any frame the resolver has not yet
//! acknowledged, so locally-recorded inputs stay retained until
//! [`InputBuilder::release_acked`] confirms them.

pub mod prediction;

use std::collections::HashMap;

use tracing::trace;

use crate::error::{LockstepError, LockstepResult};
use crate::frame_info::{utc_timestamp_ticks, MergedInput, OwnedInput, PlayerInputRecord};
use crate::ledger::FrameLedger;
use crate::pool::Recyclable;
use crate::{Frame, LockId, PlayerHandle};

use prediction::{PredictionStrategy, RepeatLastConfirmed};

/// Builds the local participant's per-frame input and predicts everyone
/// else's.
pub struct InputBuilder<I: OwnedInput> {
    local_player: PlayerHandle,
    player_count: usize,
    input_delay: i32,
    next_input_frame: Frame,
    building: Option<PlayerInputRecord<I>>,
    last_inputs: HashMap<PlayerHandle, I>,
    strategy: Box<dyn PredictionStrategy<I>>,
    local_lock: LockId,
    scratch: PlayerInputRecord<I>,
}

impl<I: OwnedInput> std::fmt::Debug for InputBuilder<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputBuilder")
            .field("local_player", &self.local_player)
            .field("input_delay", &self.input_delay)
            .field("next_input_frame", &self.next_input_frame)
            .field("building", &self.building.is_some())
            .finish_non_exhaustive()
    }
}

impl<I: OwnedInput> InputBuilder<I> {
    /// Creates a builder for `local_player` with the given input delay,
    /// predicting remote inputs with [`RepeatLastConfirmed`].
    ///
    /// Registers the builder's retention lock on the local participant's
    /// inputs.
    pub fn new(
        local_player: PlayerHandle,
        input_delay: i32,
        ledger: &mut FrameLedger<I>,
    ) -> LockstepResult<Self> {
        Self::with_strategy(local_player, input_delay, Box::new(RepeatLastConfirmed), ledger)
    }

    /// Creates a builder with a custom prediction strategy.
    pub fn with_strategy(
        local_player: PlayerHandle,
        input_delay: i32,
        strategy: Box<dyn PredictionStrategy<I>>,
        ledger: &mut FrameLedger<I>,
    ) -> LockstepResult<Self> {
        let local_lock = ledger.register_player_lock(local_player)?;
        Ok(Self {
            local_player,
            player_count: ledger.player_count(),
            input_delay: input_delay.max(0),
            next_input_frame: Frame::FIRST,
            building: None,
            last_inputs: HashMap::new(),
            strategy,
            local_lock,
            scratch: PlayerInputRecord::default(),
        })
    }

    /// The local participant this builder records for.
    #[must_use]
    pub fn local_player(&self) -> PlayerHandle {
        self.local_player
    }

    /// The configured input delay, in frames.
    #[must_use]
    pub fn input_delay(&self) -> i32 {
        self.input_delay
    }

    /// The input frame the next [`start_frame`](Self::start_frame) will open.
    #[must_use]
    pub fn next_input_frame(&self) -> Frame {
        self.next_input_frame
    }

    /// The newest input frame already pushed to the ledger; [`Frame::ZERO`]
    /// before the first push.
    #[must_use]
    pub fn latest_input_frame(&self) -> Frame {
        self.next_input_frame - 1
    }

    /// Pushes one blank input frame per frame of input delay.
    ///
    /// The first `D` simulation frames run before any deliberate input can be
    /// scheduled for them, so they are seeded with blank input up front. Must
    /// be called once, before the first [`start_frame`](Self::start_frame).
    pub fn prime_delay_frames(&mut self, ledger: &mut FrameLedger<I>) -> LockstepResult<()> {
        if self.next_input_frame != Frame::FIRST || self.building.is_some() {
            return Err(LockstepError::FrameOutOfSequence {
                expected: Frame::FIRST,
                actual: self.next_input_frame,
            });
        }
        for _ in 0..self.input_delay {
            let mut record = PlayerInputRecord::new(self.next_input_frame);
            record.push_group(I::blank_for(self.local_player));
            record.applied_timestamp = utc_timestamp_ticks();
            ledger.push_player_input(self.local_player, &record)?;
            self.next_input_frame += 1;
        }
        Ok(())
    }

    /// Opens the input frame for the simulation frame about to run.
    ///
    /// The opened record is scheduled for `sim_frame + D`. Fails with
    /// [`LockstepError::FrameOutOfSequence`] if that does not line up with
    /// the builder's next expected input frame, or if a frame is already
    /// open — either means the builder and its caller have desynchronized.
    pub fn start_frame(&mut self, sim_frame: Frame) -> LockstepResult<()> {
        let input_frame = sim_frame + self.input_delay;
        if input_frame != self.next_input_frame || self.building.is_some() {
            return Err(LockstepError::FrameOutOfSequence {
                expected: self.next_input_frame,
                actual: input_frame,
            });
        }
        self.building = Some(PlayerInputRecord::new(input_frame));
        Ok(())
    }

    /// Adds an input group to the open frame.
    ///
    /// Zero groups is valid (an idle frame); fails if no frame is open.
    pub fn push_group(&mut self, group: I) -> LockstepResult<()> {
        match self.building.as_mut() {
            Some(record) => {
                record.push_group(group);
                Ok(())
            }
            None => Err(LockstepError::FrameOutOfSequence {
                expected: self.next_input_frame,
                actual: Frame::ZERO,
            }),
        }
    }

    /// Stamps the open frame with the current wall clock, pushes it into the
    /// ledger for the local participant, and advances the input frame
    /// counter. Fails if no frame is open.
    pub fn finish_frame(&mut self, ledger: &mut FrameLedger<I>) -> LockstepResult<Frame> {
        let mut record = self
            .building
            .take()
            .ok_or(LockstepError::FrameOutOfSequence {
                expected: self.next_input_frame,
                actual: Frame::ZERO,
            })?;
        record.applied_timestamp = utc_timestamp_ticks();
        let frame = record.frame;
        ledger.push_player_input(self.local_player, &record)?;
        self.next_input_frame += 1;
        trace!(player = %self.local_player, %frame, "local input finished");
        Ok(frame)
    }

    /// Records remote participants' groups from a newly authoritative merged
    /// input, for use as prediction history. Groups owned by the local
    /// participant are ignored — local input is never predicted.
    pub fn update_last_inputs(&mut self, merged: &MergedInput<I>) {
        for group in &merged.groups {
            let owner = group.owner();
            if owner == self.local_player {
                continue;
            }
            self.last_inputs.insert(owner, *group);
        }
    }

    /// Writes into `out` the merged input to simulate `frame` with
    /// speculatively: the local participant's actual recorded input plus a
    /// predicted group for every remote participant.
    ///
    /// The local input for `frame` must still be retained — the builder holds
    /// a lock on it until [`release_acked`](Self::release_acked) — so a miss
    /// is a [`LockstepError::MissingInput`] invariant failure, not a normal
    /// outcome.
    pub fn predicted_input(
        &mut self,
        frame: Frame,
        ledger: &FrameLedger<I>,
        out: &mut MergedInput<I>,
    ) -> LockstepResult<()> {
        self.scratch.reset();
        if !ledger.try_get_player_input(self.local_player, frame, &mut self.scratch)? {
            return Err(LockstepError::MissingInput {
                player: self.local_player,
                frame,
            });
        }

        out.reset();
        out.frame = frame;
        for group in &self.scratch.groups {
            out.push_group(*group);
        }
        for slot in 0..self.player_count {
            let player = PlayerHandle::new(slot);
            if player == self.local_player {
                continue;
            }
            let last = self.last_inputs.get(&player).copied();
            out.push_group(self.strategy.predict(frame, last, player));
        }
        Ok(())
    }

    /// Releases the builder's retention of the local input for `frame`,
    /// called as the resolver acknowledges frames. After this the frame can
    /// no longer be replayed.
    pub fn release_acked(
        &mut self,
        frame: Frame,
        ledger: &mut FrameLedger<I>,
    ) -> LockstepResult<()> {
        ledger.release_player_lock(self.local_player, frame, self.local_lock)
    }
}

// #########
// # TESTS #
// #########
