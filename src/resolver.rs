//! Reconciliation of speculative simulation against authoritative frames.
//!
//! The local simulation runs ahead of the network on predicted input. The
//! [`RollbackResolver`] is the component that decides, frame by frame,
//! whether that speculation was right: as authoritative frames arrive it
//! compares the locally computed state hash for each against the
//! authoritative one, in strictly increasing frame order with no gaps.
//!
//! A matching hash acknowledges the frame and nothing else happens — the
//! overwhelmingly common case. On a mismatch the authoritative frame wins,
//! unconditionally: the simulation is rewound to the last acknowledged frame,
//! re-ticked with the authoritative merged input, re-verified, fast-forwarded
//! through any further authoritative frames already on hand, and finally the
//! still-unconfirmed local predictions are re-applied on top. A hash that
//! disagrees *after* an authoritative replay cannot be explained by
//! misprediction — the simulations themselves have diverged — and surfaces as
//! the session-fatal [`LockstepError::Desync`].
//!
//! The resolver also owns the self-throttle: a simulation that runs too far
//! ahead of its slowest peer only manufactures rollback work, so
//! [`try_modify_delta_time`](RollbackResolver::try_modify_delta_time) bleeds
//! off speed — never adds it — as the smoothed local lead grows.

use tracing::{debug, trace, warn};

use crate::error::{LockstepError, LockstepResult};
use crate::frame_info::{AuthorityFrame, MergedInput, OwnedInput};
use crate::input_builder::InputBuilder;
use crate::ledger::FrameLedger;
use crate::pool::RecyclingPool;
use crate::{Frame, LockId, PlayerHandle, Simulation, ViewSink};

/// Self-throttle tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleConfig {
    /// Smoothed frames-of-lead over the slowest peer at which local ticking
    /// suspends entirely until the peer catches up.
    pub allowed_ahead_ticks: f32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            allowed_ahead_ticks: 6.0,
        }
    }
}

/// Validates authoritative frames against local speculation and repairs the
/// simulation when they disagree.
#[derive(Debug)]
pub struct RollbackResolver<I: OwnedInput> {
    /// The next authoritative frame to verify. Starts at [`Frame::FIRST`];
    /// never skips — gaps wait until the missing frame arrives.
    next_ack_frame: Frame,
    full_lock: LockId,
    throttle: ThrottleConfig,
    ack_pool: RecyclingPool<AuthorityFrame<I>>,
    predicted_scratch: MergedInput<I>,
}

impl<I: OwnedInput> RollbackResolver<I> {
    /// Creates a resolver, registering its full-sync retention lock on the
    /// ledger.
    pub fn new(throttle: ThrottleConfig, ledger: &mut FrameLedger<I>) -> LockstepResult<Self> {
        let full_lock = ledger.register_full_lock()?;
        Ok(Self {
            next_ack_frame: Frame::FIRST,
            full_lock,
            throttle,
            ack_pool: RecyclingPool::new(),
            predicted_scratch: MergedInput::default(),
        })
    }

    /// The next authoritative frame awaiting verification.
    #[must_use]
    pub fn next_ack_frame(&self) -> Frame {
        self.next_ack_frame
    }

    /// Verifies every authoritative frame available in order, rolling back
    /// and re-simulating on mismatch. Driven once per local update tick.
    ///
    /// `sim` is the local speculative simulation, `builder` supplies replay
    /// input (actual local, predicted remote) and absorbs prediction history
    /// from each authoritative frame, and `view` is told about every frame
    /// that is re-committed.
    ///
    /// Returns [`LockstepError::Desync`] when a hash mismatch survives an
    /// authoritative replay; the session is over at that point.
    pub fn resolve<S, V>(
        &mut self,
        ledger: &mut FrameLedger<I>,
        sim: &mut S,
        builder: &mut InputBuilder<I>,
        view: &mut V,
    ) -> LockstepResult<()>
    where
        S: Simulation<I>,
        V: ViewSink,
    {
        let mut ack = self.ack_pool.acquire();
        let latest_local = sim.next_frame() - 1;
        trace!(
            %latest_local,
            next_ack = %self.next_ack_frame,
            authority_watermark = %ledger.latest_consecutive_authority_input(),
            "resolving"
        );

        while self.next_ack_frame <= latest_local
            && ledger.try_get_full_sync_data(self.next_ack_frame, &mut ack)
        {
            builder.update_last_inputs(&ack.merged);

            let frame = self.next_ack_frame;
            let local_hash = sim.hash_at(frame);
            if local_hash == ack.checksum {
                trace!(%frame, "prediction confirmed");
                self.advance_ack_frame(builder, ledger)?;
            } else {
                // Rewind to the last acknowledged frame, replay this frame
                // with the authoritative input, and verify the repair took.
                warn!(
                    %frame,
                    local = local_hash,
                    authority = ack.checksum,
                    "misprediction, rolling back"
                );
                sim.restore_to(frame - 1);
                view.reset_to_frame(frame);
                sim.tick(&ack.merged);
                view.push_frame(frame);

                let replayed = sim.hash_at(frame);
                if replayed != ack.checksum {
                    return Err(LockstepError::Desync {
                        frame,
                        local_checksum: replayed,
                        authority_checksum: ack.checksum,
                    });
                }
                debug!(restored_to = %(frame - 1), "rollback repaired");
                self.advance_ack_frame(builder, ledger)?;

                // Fast-forward through any further authoritative frames
                // already on hand, verifying each.
                while self.next_ack_frame <= latest_local
                    && ledger.try_get_full_sync_data(self.next_ack_frame, &mut ack)
                {
                    let frame = self.next_ack_frame;
                    sim.tick(&ack.merged);
                    view.push_frame(frame);
                    let replayed = sim.hash_at(frame);
                    if replayed != ack.checksum {
                        return Err(LockstepError::Desync {
                            frame,
                            local_checksum: replayed,
                            authority_checksum: ack.checksum,
                        });
                    }
                    self.advance_ack_frame(builder, ledger)?;
                }

                // Re-apply the local predictions still ahead of the newly
                // corrected baseline.
                let mut replay = self.next_ack_frame;
                while replay <= latest_local {
                    builder.predicted_input(replay, ledger, &mut self.predicted_scratch)?;
                    sim.tick(&self.predicted_scratch);
                    view.push_frame(replay);
                    replay += 1;
                }
            }

            ledger.release_full_lock_at_or_below(self.next_ack_frame - 1, self.full_lock)?;
        }

        self.ack_pool.release(ack);
        Ok(())
    }

    fn advance_ack_frame(
        &mut self,
        builder: &mut InputBuilder<I>,
        ledger: &mut FrameLedger<I>,
    ) -> LockstepResult<()> {
        builder.release_acked(self.next_ack_frame, ledger)?;
        self.next_ack_frame += 1;
        Ok(())
    }

    /// The self-throttle: decides whether — and at what speed — the local
    /// simulation may advance this update.
    ///
    /// Records the local lead (frames simulated beyond the acknowledged
    /// authoritative watermark) into the ledger's windowed average, then
    /// compares the smoothed local lead against the largest smoothed lead
    /// among the other participants:
    ///
    /// - difference at or above the configured ceiling: returns `None` — skip
    ///   ticking entirely this update and let the peer catch up;
    /// - difference in (2, ceiling): `0.90 × dt`;
    /// - difference in (1, 2]: `0.96 × dt`;
    /// - difference in (0, 1]: `0.99 × dt`;
    /// - otherwise `dt` unchanged. Time is never scaled *up*: a peer that is
    ///   behind slows everyone down, nobody accelerates to catch up.
    pub fn try_modify_delta_time<S: Simulation<I>>(
        &mut self,
        player: PlayerHandle,
        dt_ms: f32,
        ledger: &mut FrameLedger<I>,
        sim: &S,
    ) -> LockstepResult<Option<f32>> {
        let lead = sim.next_frame() - ledger.latest_consecutive_authority_input();
        ledger.add_ahead_by(player, lead as f32)?;

        let local_lead = ledger.ahead_by(player);
        let mut peer_lead: Option<f32> = None;
        for slot in 0..ledger.player_count() {
            let peer = PlayerHandle::new(slot);
            if peer == player {
                continue;
            }
            let lead = ledger.ahead_by(peer);
            peer_lead = Some(peer_lead.map_or(lead, |best| best.max(lead)));
        }
        let delta = local_lead - peer_lead.unwrap_or(0.0);

        trace!(%player, local_lead, delta, "throttle check");
        if delta >= self.throttle.allowed_ahead_ticks {
            debug!(%player, delta, "too far ahead, suspending tick");
            return Ok(None);
        }

        let scaled = if delta > 2.0 {
            dt_ms * 0.90
        } else if delta > 1.0 {
            dt_ms * 0.96
        } else if delta > 0.0 {
            dt_ms * 0.99
        } else {
            dt_ms
        };
        Ok(Some(scaled))
    }
}

// #########
// # TESTS #
// #########
