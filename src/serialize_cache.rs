//! Per-frame serialization caches.
//!
//! Unacknowledged frames are resent — to multiple peers, and again after
//! packet loss — so the same record can need its encoded form many times.
//! The caches here encode each frame once, on first request, into a pooled
//! byte buffer keyed by frame number, and hold it until the acknowledgment
//! watermark passes the frame.
//!
//! Each cache registers its own retention lock on the ledger at construction:
//! the cache itself is a holder of the frames it may still need to encode.
//! [`release_at_or_below`](PlayerInputCache::release_at_or_below) is the
//! single releasing gesture — it returns the cached buffers to the byte pool
//! *and* forwards the same ceiling to the matching ledger lock release, so
//! cache retention and ledger retention advance together.
//!
//! One [`PlayerInputCache`] exists per (participant, direction) pair that
//! resends input; one [`AuthorityCache`] per sender of authoritative frames.

use std::collections::HashMap;

use tracing::trace;

use crate::codec::FrameCodec;
use crate::error::{LockstepError, LockstepResult};
use crate::frame_info::{AuthorityFrame, OwnedInput, PlayerInputRecord};
use crate::ledger::FrameLedger;
use crate::pool::{ByteBuf, Recyclable, RecyclingPool};
use crate::{Frame, LockId, PlayerHandle};

/// Lazily-encoded payloads of one participant's input records.
#[derive(Debug)]
pub struct PlayerInputCache<I: OwnedInput, C: FrameCodec<I>> {
    player: PlayerHandle,
    codec: C,
    lock: LockId,
    cache: HashMap<Frame, ByteBuf>,
    byte_pool: RecyclingPool<ByteBuf>,
    /// Smallest frame ever cached; release sweeps scan down to it. Never
    /// rises once set — stale lows just make the sweep probe empty keys.
    min_key: Option<Frame>,
    scratch: PlayerInputRecord<I>,
}

impl<I: OwnedInput, C: FrameCodec<I>> PlayerInputCache<I, C> {
    /// Creates a cache for `player`'s inputs, registering its retention lock
    /// on the ledger.
    pub fn new(
        player: PlayerHandle,
        codec: C,
        ledger: &mut FrameLedger<I>,
    ) -> LockstepResult<Self> {
        let lock = ledger.register_player_lock(player)?;
        Ok(Self {
            player,
            codec,
            lock,
            cache: HashMap::new(),
            byte_pool: RecyclingPool::new(),
            min_key: None,
            scratch: PlayerInputRecord::default(),
        })
    }

    /// The retention lock this cache holds on the ledger.
    #[must_use]
    pub fn lock(&self) -> LockId {
        self.lock
    }

    /// The encoded payload for `frame`: cached bytes if present, otherwise
    /// fetched from the ledger and encoded into a pooled buffer.
    ///
    /// The cache must only be asked for frames the ledger still retains;
    /// a missing record means the caller released the frame before the peer
    /// acknowledged it, and fails with [`LockstepError::FrameNotRetained`].
    pub fn get_serialized(
        &mut self,
        frame: Frame,
        ledger: &FrameLedger<I>,
    ) -> LockstepResult<&[u8]> {
        if !self.cache.contains_key(&frame) {
            self.scratch.reset();
            if !ledger.try_get_player_input(self.player, frame, &mut self.scratch)? {
                return Err(LockstepError::FrameNotRetained { frame });
            }

            let mut buf = self.byte_pool.acquire();
            self.codec.serialize_input(&self.scratch, buf.as_mut_vec())?;
            trace!(player = %self.player, %frame, bytes = buf.len(), "input serialized");
            self.cache.insert(frame, buf);

            if self.min_key.is_none_or(|min| frame < min) {
                self.min_key = Some(frame);
            }
        }

        self.cache
            .get(&frame)
            .map(ByteBuf::as_slice)
            .ok_or(LockstepError::FrameNotRetained { frame })
    }

    /// Drops cached payloads for every frame at or below `ceiling` (scanning
    /// from the ceiling down to the tracked minimum) and forwards the ceiling
    /// to the ledger's player-lock release for this cache's holder bit.
    ///
    /// Called when the peer acknowledges `ceiling`: nothing at or below it
    /// will ever be resent.
    pub fn release_at_or_below(
        &mut self,
        ceiling: Frame,
        ledger: &mut FrameLedger<I>,
    ) -> LockstepResult<()> {
        if let Some(min) = self.min_key {
            let mut frame = ceiling;
            while frame >= min {
                if let Some(buf) = self.cache.remove(&frame) {
                    self.byte_pool.release(buf);
                }
                frame = frame - 1;
            }
        }
        ledger.release_player_locks_at_or_below(self.player, ceiling, self.lock)
    }

    /// Number of frames currently cached.
    #[must_use]
    pub fn cached_frames(&self) -> usize {
        self.cache.len()
    }
}

/// Lazily-encoded payloads of authoritative frame records.
#[derive(Debug)]
pub struct AuthorityCache<I: OwnedInput, C: FrameCodec<I>> {
    codec: C,
    lock: LockId,
    cache: HashMap<Frame, ByteBuf>,
    byte_pool: RecyclingPool<ByteBuf>,
    min_key: Option<Frame>,
    scratch: AuthorityFrame<I>,
}

impl<I: OwnedInput, C: FrameCodec<I>> AuthorityCache<I, C> {
    /// Creates an authoritative-frame cache, registering its retention lock
    /// on the ledger.
    pub fn new(codec: C, ledger: &mut FrameLedger<I>) -> LockstepResult<Self> {
        let lock = ledger.register_full_lock()?;
        Ok(Self {
            codec,
            lock,
            cache: HashMap::new(),
            byte_pool: RecyclingPool::new(),
            min_key: None,
            scratch: AuthorityFrame::default(),
        })
    }

    /// The retention lock this cache holds on the ledger.
    #[must_use]
    pub fn lock(&self) -> LockId {
        self.lock
    }

    /// The encoded payload for the authoritative record of `frame`; same
    /// contract as [`PlayerInputCache::get_serialized`].
    pub fn get_serialized(
        &mut self,
        frame: Frame,
        ledger: &FrameLedger<I>,
    ) -> LockstepResult<&[u8]> {
        if !self.cache.contains_key(&frame) {
            self.scratch.reset();
            if !ledger.try_get_full_sync_data(frame, &mut self.scratch) {
                return Err(LockstepError::FrameNotRetained { frame });
            }

            let mut buf = self.byte_pool.acquire();
            self.codec
                .serialize_authority(&self.scratch, buf.as_mut_vec())?;
            trace!(%frame, bytes = buf.len(), "authoritative frame serialized");
            self.cache.insert(frame, buf);

            if self.min_key.is_none_or(|min| frame < min) {
                self.min_key = Some(frame);
            }
        }

        self.cache
            .get(&frame)
            .map(ByteBuf::as_slice)
            .ok_or(LockstepError::FrameNotRetained { frame })
    }

    /// Drops cached payloads at or below `ceiling` and forwards the ceiling
    /// to the ledger's full-lock release for this cache's holder bit.
    pub fn release_at_or_below(
        &mut self,
        ceiling: Frame,
        ledger: &mut FrameLedger<I>,
    ) -> LockstepResult<()> {
        if let Some(min) = self.min_key {
            let mut frame = ceiling;
            while frame >= min {
                if let Some(buf) = self.cache.remove(&frame) {
                    self.byte_pool.release(buf);
                }
                frame = frame - 1;
            }
        }
        ledger.release_full_lock_at_or_below(ceiling, self.lock)
    }

    /// Number of frames currently cached.
    #[must_use]
    pub fn cached_frames(&self) -> usize {
        self.cache.len()
    }
}

// #########
// # TESTS #
// #########
