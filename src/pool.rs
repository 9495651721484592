//! Object recycling for frame-shaped records.
//!
//! A lockstep session touches one record per player per frame, at simulation
//! rate, for the lifetime of the session. Allocating those records fresh each
//! frame churns the allocator for no benefit: the records all have the same
//! shape and their buffers stabilize at a small size after the first few
//! frames. [`RecyclingPool`] keeps released instances on a free list and hands
//! them back out, reset, instead of allocating.
//!
//! Acquisition and release are explicit. A caller that releases an instance
//! must not retain any handle to it; the pool is the sole owner between
//! `release` and the next `acquire`.

/// A type that can be stored in a [`RecyclingPool`].
///
/// `reset` must return the instance to a state indistinguishable from
/// `Default::default()` as far as later users can observe, while retaining
/// internal capacity (cleared `Vec`s keep their allocation, which is the whole
/// point of pooling).
pub trait Recyclable: Default {
    /// Clears all observable state, keeping allocations where possible.
    fn reset(&mut self);
}

/// A free list of reusable instances.
///
/// `acquire` pops a previously-released instance (already reset) or allocates
/// a new one when the pool is empty. `release` resets the instance and pushes
/// it back. The pool never shrinks.
///
/// All operations run on the single simulation thread; this is a reuse
/// mechanism, not a synchronization one.
#[derive(Debug)]
pub struct RecyclingPool<T: Recyclable> {
    free: Vec<T>,
}

impl<T: Recyclable> Default for RecyclingPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Recyclable> RecyclingPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self { free: Vec::new() }
    }

    /// Creates a pool pre-seeded with `count` default instances.
    #[must_use]
    pub fn with_capacity(count: usize) -> Self {
        let mut free = Vec::with_capacity(count);
        free.resize_with(count, T::default);
        Self { free }
    }

    /// Returns a reset instance, allocating only if the free list is empty.
    #[must_use]
    pub fn acquire(&mut self) -> T {
        self.free.pop().unwrap_or_default()
    }

    /// Returns an instance to the pool. The instance is reset before it is
    /// stored; the caller must not keep any reference to it.
    pub fn release(&mut self, mut instance: T) {
        instance.reset();
        self.free.push(instance);
    }

    /// Number of instances currently on the free list.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.len()
    }
}

/// A recyclable byte buffer for serialized frame payloads.
///
/// The serialization caches encode each frame once and hold the bytes until
/// the frame is acknowledged; the buffers cycle through a pool so steady-state
/// operation performs no byte-buffer allocation at all.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ByteBuf {
    bytes: Vec<u8>,
}

impl ByteBuf {
    /// The stored bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable access for encoders writing into the buffer.
    pub fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    /// Length of the stored payload.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Recyclable for ByteBuf {
    fn reset(&mut self) {
        self.bytes.clear();
    }
}

// #########
// # TESTS #
// #########
