//! Convenient re-exports for common usage.
//!
//! This module provides a "prelude" that re-exports the most commonly used
//! types from Fortress Lockstep, allowing you to import them all at once.
//!
//! # Usage
//!
//! ```rust
//! use fortress_lockstep::prelude::*;
//! ```
//!
//! # What's Included
//!
//! - **Fundamental types**: [`Frame`], [`PlayerHandle`], [`LockId`]
//! - **Core components**: [`FrameLedger`], [`InputBuilder`], [`MergeDriver`],
//!   [`RollbackResolver`], [`FrameClock`]
//! - **Records**: [`PlayerInputRecord`], [`MergedInput`], [`AuthorityFrame`]
//! - **Collaborator traits**: [`Simulation`], [`ViewSink`], [`FrameCodec`],
//!   [`OwnedInput`], [`PredictionStrategy`]
//! - **Serialization caches**: [`PlayerInputCache`], [`AuthorityCache`],
//!   [`BincodeFrameCodec`]
//! - **Error handling**: [`LockstepError`], [`LockstepResult`]

// Fundamental types
pub use crate::{Frame, LockId, PlayerHandle};

// Core components
pub use crate::frame_clock::FrameClock;
pub use crate::input_builder::InputBuilder;
pub use crate::ledger::{FrameLedger, LedgerEvent};
pub use crate::merge_driver::MergeDriver;
pub use crate::resolver::{RollbackResolver, ThrottleConfig};

// Frame records
pub use crate::frame_info::{AuthorityFrame, MergedInput, PlayerInputRecord};

// Collaborator traits
pub use crate::codec::FrameCodec;
pub use crate::frame_info::OwnedInput;
pub use crate::input_builder::prediction::{
    BlankPrediction, PredictionStrategy, RepeatLastConfirmed,
};
pub use crate::{Simulation, ViewSink};

// Serialization
pub use crate::codec::BincodeFrameCodec;
pub use crate::serialize_cache::{AuthorityCache, PlayerInputCache};

// Error handling
pub use crate::error::{LockstepError, LockstepResult};
