//! Shared stubs for integration tests: a deterministic, rewindable
//! stand-in simulation, a recording view sink, and a small owned input type.

// Not every test binary uses every stub.
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use fortress_lockstep::prelude::*;

/// One participant's input group: a movement axis plus a momentary action.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInput {
    pub owner: usize,
    pub axis: i16,
    pub action: bool,
}

impl OwnedInput for TestInput {
    fn owner(&self) -> PlayerHandle {
        PlayerHandle::new(self.owner)
    }

    fn blank_for(owner: PlayerHandle) -> Self {
        Self {
            owner: owner.as_usize(),
            axis: 0,
            action: false,
        }
    }
}

fn group_hash(group: &TestInput) -> u32 {
    let mut hash = group.owner as u32;
    hash = hash.wrapping_mul(0x9E37_79B9).wrapping_add(group.axis as u32);
    hash.wrapping_mul(0x9E37_79B9)
        .wrapping_add(u32::from(group.action))
}

/// A deterministic, rewindable simulation stub.
///
/// The state hash chains frame over frame (order-sensitive in time) but
/// combines a frame's input groups commutatively, the way independent
/// per-player inputs apply to disjoint entities: the merged order of groups
/// within one frame does not change the resulting state.
#[derive(Debug, Default)]
pub struct StubSimulation {
    /// committed[f - 1] = state hash after frame f.
    pub committed: Vec<u32>,
}

impl StubSimulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_hash(&self) -> Option<u32> {
        self.committed.last().copied()
    }
}

impl Simulation<TestInput> for StubSimulation {
    fn tick(&mut self, input: &MergedInput<TestInput>) {
        let previous = self.latest_hash().unwrap_or(0x5EED);
        let mut group_sum: u32 = 0;
        for group in &input.groups {
            group_sum = group_sum.wrapping_add(group_hash(group));
        }
        let hash = previous
            .wrapping_mul(31)
            .wrapping_add(input.frame.as_i32() as u32)
            .wrapping_mul(31)
            .wrapping_add(group_sum);
        self.committed.push(hash);
    }

    fn hash_at(&self, frame: Frame) -> u32 {
        self.committed[frame.as_i32() as usize - 1]
    }

    fn restore_to(&mut self, frame: Frame) {
        self.committed.truncate(frame.as_i32() as usize);
    }

    fn next_frame(&self) -> Frame {
        Frame::new(self.committed.len() as i32 + 1)
    }
}

/// Records everything the resolver tells the view layer.
#[derive(Debug, Default)]
pub struct RecordingView {
    pub pushed: Vec<Frame>,
    pub resets: Vec<Frame>,
}

impl ViewSink for RecordingView {
    fn push_frame(&mut self, frame: Frame) {
        self.pushed.push(frame);
    }

    fn reset_to_frame(&mut self, frame: Frame) {
        self.resets.push(frame);
    }
}

/// Installs a test-friendly tracing subscriber (idempotent).
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
