//! Per-frame input records.
//!
//! Defines the game-facing [`OwnedInput`] trait and the frame record types the
//! ledger stores: [`PlayerInputRecord`], [`MergedInput`], and
//! [`AuthorityFrame`].

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use smallvec::SmallVec;

use crate::pool::Recyclable;
use crate::{Frame, PlayerHandle};

/// Number of input groups a single participant record holds without spilling
/// to the heap. One or two groups per frame is typical (movement + at most
/// one action).
const PLAYER_GROUPS_INLINE: usize = 4;

/// Number of input groups a merged record holds without spilling to the heap.
const MERGED_GROUPS_INLINE: usize = 8;

/// Current wall-clock time in 100-nanosecond ticks since the Unix epoch.
///
/// The resolution matches [`PlayerInputRecord::applied_timestamp`]; the merge
/// driver converts differences to milliseconds by dividing by 10,000.
pub(crate) fn utc_timestamp_ticks() -> i64 {
    web_time::SystemTime::now()
        .duration_since(web_time::SystemTime::UNIX_EPOCH)
        .map(|elapsed| (elapsed.as_nanos() / 100) as i64)
        .unwrap_or(0)
}

/// A typed input group owned by one participant.
///
/// This is the only game-defined type the core handles. A group is a small
/// `Copy` value describing one participant's input contribution for one frame
/// (stick vector, button states, a join request, ...), tagged with the
/// participant that produced it so merged frames can be attributed back to
/// their owners for prediction.
///
/// Implementations must serialize deterministically (the merged groups are
/// part of the hashed authoritative record on the engine side).
pub trait OwnedInput: Copy + PartialEq + Serialize + DeserializeOwned {
    /// The participant this group belongs to.
    fn owner(&self) -> PlayerHandle;

    /// A "no input" group attributed to `owner`, used when predicting for a
    /// participant that has no confirmed input yet.
    fn blank_for(owner: PlayerHandle) -> Self;
}

/// One participant's input for one frame.
///
/// Created by the local input builder or by deserializing a network payload,
/// copied — never aliased — when it moves between the builder, the ledger,
/// and the serialization cache. The ledger stores pooled copies; see
/// [`Recyclable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "I: OwnedInput"))]
pub struct PlayerInputRecord<I: OwnedInput> {
    /// The frame this input is scheduled for.
    pub frame: Frame,
    /// The participant's input groups for this frame.
    pub groups: SmallVec<[I; PLAYER_GROUPS_INLINE]>,
    /// Wall-clock instant the input was recorded locally, in 100-nanosecond
    /// ticks since the Unix epoch. Used by the merge driver for clock-offset
    /// estimation; never part of the simulation.
    pub applied_timestamp: i64,
}

impl<I: OwnedInput> Default for PlayerInputRecord<I> {
    fn default() -> Self {
        Self {
            frame: Frame::ZERO,
            groups: SmallVec::new(),
            applied_timestamp: 0,
        }
    }
}

impl<I: OwnedInput> PlayerInputRecord<I> {
    /// Creates an empty record for `frame`.
    #[must_use]
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }

    /// Appends an input group.
    pub fn push_group(&mut self, group: I) {
        self.groups.push(group);
    }

    /// Overwrites this record with a field-for-field copy of `other`,
    /// reusing this record's group storage.
    pub fn copy_from(&mut self, other: &Self) {
        self.frame = other.frame;
        self.applied_timestamp = other.applied_timestamp;
        self.groups.clear();
        self.groups.extend_from_slice(&other.groups);
    }
}

impl<I: OwnedInput> Recyclable for PlayerInputRecord<I> {
    fn reset(&mut self) {
        self.frame = Frame::ZERO;
        self.applied_timestamp = 0;
        self.groups.clear();
    }
}

/// The union of every participant's input groups for one frame.
///
/// This is what the simulation ticks on: for an authoritative frame it holds
/// each participant's real groups, for a speculative frame the local
/// participant's real groups plus one predicted group per remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "I: OwnedInput"))]
pub struct MergedInput<I: OwnedInput> {
    /// The frame this merged input drives.
    pub frame: Frame,
    /// All participants' input groups, in participant order.
    pub groups: SmallVec<[I; MERGED_GROUPS_INLINE]>,
}

impl<I: OwnedInput> Default for MergedInput<I> {
    fn default() -> Self {
        Self {
            frame: Frame::ZERO,
            groups: SmallVec::new(),
        }
    }
}

impl<I: OwnedInput> MergedInput<I> {
    /// Creates an empty merged input for `frame`.
    #[must_use]
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            groups: SmallVec::new(),
        }
    }

    /// Appends an input group.
    pub fn push_group(&mut self, group: I) {
        self.groups.push(group);
    }

    /// Overwrites this merged input with a copy of `other`, reusing storage.
    pub fn copy_from(&mut self, other: &Self) {
        self.frame = other.frame;
        self.groups.clear();
        self.groups.extend_from_slice(&other.groups);
    }

    /// The groups owned by `player`.
    pub fn groups_for(&self, player: PlayerHandle) -> impl Iterator<Item = &I> {
        self.groups.iter().filter(move |g| g.owner() == player)
    }
}

impl<I: OwnedInput> Recyclable for MergedInput<I> {
    fn reset(&mut self) {
        self.frame = Frame::ZERO;
        self.groups.clear();
    }
}

/// The authoritative record for one frame: the merged input every participant
/// agreed to run, plus the state hash the authoritative simulation produced
/// from it.
///
/// Produced exactly once per frame by the host's merge driver (or received
/// from the network on non-host participants) and immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "I: OwnedInput"))]
pub struct AuthorityFrame<I: OwnedInput> {
    /// The merged input for the frame.
    pub merged: MergedInput<I>,
    /// 32-bit, order-sensitive hash of the simulation state after the frame.
    pub checksum: u32,
}

impl<I: OwnedInput> Default for AuthorityFrame<I> {
    fn default() -> Self {
        Self {
            merged: MergedInput::default(),
            checksum: 0,
        }
    }
}

impl<I: OwnedInput> AuthorityFrame<I> {
    /// The frame this record describes.
    #[must_use]
    pub fn frame(&self) -> Frame {
        self.merged.frame
    }

    /// Overwrites this record with a copy of `other`, reusing storage.
    pub fn copy_from(&mut self, other: &Self) {
        self.merged.copy_from(&other.merged);
        self.checksum = other.checksum;
    }
}

impl<I: OwnedInput> Recyclable for AuthorityFrame<I> {
    fn reset(&mut self) {
        self.merged.reset();
        self.checksum = 0;
    }
}

// #########
// # TESTS #
// #########

#[cfg(test)]
mod frame_info_tests {
    use super::*;

    #[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
    struct StickInput {
        owner: usize,
        x: i16,
        jump: bool,
    }

    impl OwnedInput for StickInput {
        fn owner(&self) -> PlayerHandle {
            PlayerHandle::new(self.owner)
        }

        fn blank_for(owner: PlayerHandle) -> Self {
            Self {
                owner: owner.as_usize(),
                x: 0,
                jump: false,
            }
        }
    }

    #[test]
    fn player_record_copy_is_field_for_field() {
        let mut original = PlayerInputRecord::new(Frame::new(7));
        original.push_group(StickInput {
            owner: 0,
            x: -100,
            jump: true,
        });
        original.applied_timestamp = 1_234_567;

        let mut copy = PlayerInputRecord::default();
        copy.copy_from(&original);
        assert_eq!(copy, original);
    }

    #[test]
    fn player_record_reset_clears_everything() {
        let mut record = PlayerInputRecord::new(Frame::new(3));
        record.push_group(StickInput {
            owner: 1,
            x: 5,
            jump: false,
        });
        record.applied_timestamp = 42;

        record.reset();
        assert_eq!(record, PlayerInputRecord::default());
    }

    #[test]
    fn copy_from_discards_previous_groups() {
        let mut target = PlayerInputRecord::new(Frame::new(1));
        target.push_group(StickInput {
            owner: 0,
            x: 1,
            jump: false,
        });
        target.push_group(StickInput {
            owner: 0,
            x: 2,
            jump: false,
        });

        let source: PlayerInputRecord<StickInput> = PlayerInputRecord::new(Frame::new(2));
        target.copy_from(&source);
        assert!(target.groups.is_empty());
        assert_eq!(target.frame, Frame::new(2));
    }

    #[test]
    fn merged_input_attributes_groups_to_owners() {
        let mut merged = MergedInput::new(Frame::new(4));
        merged.push_group(StickInput {
            owner: 0,
            x: 10,
            jump: false,
        });
        merged.push_group(StickInput {
            owner: 1,
            x: -10,
            jump: true,
        });

        let for_one: Vec<_> = merged.groups_for(PlayerHandle::new(1)).collect();
        assert_eq!(for_one.len(), 1);
        assert_eq!(for_one[0].x, -10);
        assert_eq!(merged.groups_for(PlayerHandle::new(2)).count(), 0);
    }

    #[test]
    fn authority_frame_reports_merged_frame_number() {
        let mut record: AuthorityFrame<StickInput> = AuthorityFrame::default();
        record.merged.frame = Frame::new(9);
        record.checksum = 0xFEED;
        assert_eq!(record.frame(), Frame::new(9));

        let mut copy = AuthorityFrame::default();
        copy.copy_from(&record);
        assert_eq!(copy, record);

        copy.reset();
        assert_eq!(copy.frame(), Frame::ZERO);
        assert_eq!(copy.checksum, 0);
    }

    #[test]
    fn blank_input_carries_its_owner() {
        let blank = StickInput::blank_for(PlayerHandle::new(3));
        assert_eq!(blank.owner(), PlayerHandle::new(3));
        assert_eq!(blank.x, 0);
        assert!(!blank.jump);
    }
}
