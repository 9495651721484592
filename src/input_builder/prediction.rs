//! Input prediction strategies for speculative simulation.
//!
//! When the local simulation runs ahead of the network, every remote
//! participant's input for the upcoming frame is unknown and must be guessed.
//! The guess only ever feeds the *local* speculative simulation — it is never
//! transmitted, and it is discarded as soon as the real authoritative frame
//! supersedes it through the rollback resolver — but a good guess means fewer
//! rollbacks.
//!
//! # Determinism
//!
//! Predictions never cross the wire, so unlike the merged authoritative
//! input they do not need to agree between peers. They do need to be
//! *reproducible locally*: the resolver re-requests the predicted input for a
//! frame when replaying it after a rollback, and the replayed prediction must
//! match what was originally simulated. Strategies must therefore derive
//! their output only from the arguments they are given.

use crate::frame_info::OwnedInput;
use crate::{Frame, PlayerHandle};

/// Synthesizes a remote participant's input group for a frame that has no
/// confirmed input yet.
///
/// `last_confirmed` is the most recent input group seen from that participant
/// in an authoritative frame, or `None` before any arrived.
pub trait PredictionStrategy<I: OwnedInput> {
    /// Predicts `player`'s input group for `frame`.
    fn predict(&self, frame: Frame, last_confirmed: Option<I>, player: PlayerHandle) -> I;
}

/// The default strategy: repeat the participant's last confirmed input.
///
/// A player holding a direction keeps holding it far more often than not, so
/// repeating the last known input is right most of the time. Momentary
/// actions (a jump press, a menu confirm) are the exception — latching those
/// mispredicts every frame until the real input arrives. Strategies for games
/// with momentary actions should mask them out of the repeated group; this
/// default repeats the group verbatim.
///
/// Before any confirmed input exists the prediction is the blank group for
/// that participant.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepeatLastConfirmed;

impl<I: OwnedInput> PredictionStrategy<I> for RepeatLastConfirmed {
    fn predict(&self, _frame: Frame, last_confirmed: Option<I>, player: PlayerHandle) -> I {
        last_confirmed.unwrap_or_else(|| I::blank_for(player))
    }
}

/// A strategy that always predicts "no input".
///
/// Useful when repeating the last input is dangerous for the game's rules, or
/// as a baseline when measuring misprediction rates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlankPrediction;

impl<I: OwnedInput> PredictionStrategy<I> for BlankPrediction {
    fn predict(&self, _frame: Frame, _last_confirmed: Option<I>, player: PlayerHandle) -> I {
        I::blank_for(player)
    }
}

// #########
// # TESTS #
// #########
