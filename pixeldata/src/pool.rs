//! A process-wide pool of numeric buffers,
//! reused across pixel data decodes.
//!
//! Buffers are bucketed by element type and size class,
//! the size class being the requested element count
//! rounded up to the next power of two.
//! A request is only ever served by a buffer
//! of the same element type and size class.
//!
//! The pool has its own lock.
//! It must not be called while holding the lock of a decoder.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::mem::size_of;
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

/// The maximum number of idle buffers kept in each bucket.
pub const MAX_BUFFERS_PER_BUCKET: usize = 16;

/// The element type of a pooled buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    U8,
    U16,
    I16,
    F32,
    F64,
}

/// An idle buffer held by the pool.
#[derive(Debug)]
pub enum PooledBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl PooledBuffer {
    fn capacity_bytes(&self) -> usize {
        match self {
            PooledBuffer::U8(v) => v.capacity(),
            PooledBuffer::U16(v) => v.capacity() * size_of::<u16>(),
            PooledBuffer::I16(v) => v.capacity() * size_of::<i16>(),
            PooledBuffer::F32(v) => v.capacity() * size_of::<f32>(),
            PooledBuffer::F64(v) => v.capacity() * size_of::<f64>(),
        }
    }
}

/// A numeric type which can be pooled.
pub trait PoolElement: Copy + Default + Send + 'static {
    /// The bucket key of this type.
    const KIND: ElementKind;

    /// Wrap a buffer for storage in the pool.
    fn wrap(buffer: Vec<Self>) -> PooledBuffer;

    /// Take a buffer of this type back from the pool.
    fn unwrap(buffer: PooledBuffer) -> Option<Vec<Self>>;
}

macro_rules! impl_pool_element {
    ($t:ty, $variant:ident) => {
        impl PoolElement for $t {
            const KIND: ElementKind = ElementKind::$variant;

            fn wrap(buffer: Vec<Self>) -> PooledBuffer {
                PooledBuffer::$variant(buffer)
            }

            fn unwrap(buffer: PooledBuffer) -> Option<Vec<Self>> {
                match buffer {
                    PooledBuffer::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_pool_element!(u8, U8);
impl_pool_element!(u16, U16);
impl_pool_element!(i16, I16);
impl_pool_element!(f32, F32);
impl_pool_element!(f64, F64);

/// A snapshot of the pool's counters.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// requests served by a pooled buffer
    pub hits: u64,
    /// requests which needed a new allocation
    pub misses: u64,
    /// idle buffers currently held
    pub pooled_buffers: usize,
    /// total capacity of the idle buffers, in bytes
    pub pooled_bytes: usize,
}

impl PoolStats {
    /// The fraction of requests served by a pooled buffer,
    /// or 0 if there were no requests.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type BucketKey = (ElementKind, usize);

#[derive(Debug, Default)]
struct PoolState {
    buckets: HashMap<BucketKey, Vec<PooledBuffer>>,
    hits: u64,
    misses: u64,
}

/// A thread safe pool of numeric buffers.
///
/// # Example
///
/// ```
/// # use dcmstack_pixeldata::BufferPool;
/// let pool = BufferPool::new();
/// let buffer: Vec<u16> = pool.acquire(512 * 512);
/// assert!(buffer.capacity() >= 512 * 512);
/// pool.release(buffer);
///
/// let again: Vec<u16> = pool.acquire(512 * 512);
/// assert_eq!(pool.stats().hits, 1);
/// # drop(again);
/// ```
#[derive(Debug, Default)]
pub struct BufferPool {
    state: Mutex<PoolState>,
}

lazy_static! {
    static ref GLOBAL_POOL: BufferPool = BufferPool::new();
}

/// The size class of a request for `count` elements.
fn size_class(count: usize) -> usize {
    count.max(1).checked_next_power_of_two().unwrap_or(count)
}

/// The largest size class a buffer of the given capacity can serve.
fn class_of_capacity(capacity: usize) -> Option<usize> {
    if capacity == 0 {
        None
    } else {
        Some(1 << (usize::BITS - 1 - capacity.leading_zeros()))
    }
}

impl BufferPool {
    /// Create a new, empty pool.
    pub fn new() -> Self {
        BufferPool::default()
    }

    /// The process-wide pool.
    pub fn global() -> &'static BufferPool {
        &GLOBAL_POOL
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // the state is consistent after every statement,
        // so a poisoned lock can be recovered
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Obtain an empty buffer with a capacity of at least `count` elements.
    pub fn acquire<T: PoolElement>(&self, count: usize) -> Vec<T> {
        let class = size_class(count);
        let pooled = {
            let mut state = self.lock();
            let buffer = state
                .buckets
                .get_mut(&(T::KIND, class))
                .and_then(|bucket| bucket.pop());
            if buffer.is_some() {
                state.hits += 1;
            } else {
                state.misses += 1;
            }
            buffer
        };

        match pooled.and_then(T::unwrap) {
            Some(mut buffer) => {
                buffer.clear();
                buffer
            }
            None => {
                trace!("Allocating {:?} buffer of {} elements", T::KIND, class);
                Vec::with_capacity(class)
            }
        }
    }

    /// Obtain a buffer of exactly `count` elements, filled with zeros.
    pub fn acquire_zeroed<T: PoolElement>(&self, count: usize) -> Vec<T> {
        let mut buffer = self.acquire(count);
        buffer.resize(count, T::default());
        buffer
    }

    /// Give a buffer back to the pool.
    ///
    /// Buffers without capacity are dropped,
    /// as are buffers beyond the bucket's capacity.
    pub fn release<T: PoolElement>(&self, buffer: Vec<T>) {
        let Some(class) = class_of_capacity(buffer.capacity()) else {
            return;
        };
        let mut state = self.lock();
        let bucket = state.buckets.entry((T::KIND, class)).or_default();
        if bucket.len() < MAX_BUFFERS_PER_BUCKET {
            bucket.push(T::wrap(buffer));
        }
    }

    /// Drop about half of the idle buffers of every bucket.
    ///
    /// Returns the number of buffers dropped.
    pub fn release_half(&self) -> usize {
        let evicted: Vec<PooledBuffer> = {
            let mut state = self.lock();
            let mut evicted = Vec::new();
            for bucket in state.buckets.values_mut() {
                let keep = bucket.len() / 2;
                evicted.extend(bucket.drain(keep..));
            }
            state.buckets.retain(|_, bucket| !bucket.is_empty());
            evicted
        };
        // memory is freed outside of the lock
        evicted.len()
    }

    /// Drop all idle buffers.
    ///
    /// The hit and miss counters are kept.
    pub fn clear(&self) {
        let buckets = std::mem::take(&mut self.lock().buckets);
        drop(buckets);
    }

    /// Reset the hit and miss counters.
    pub fn reset_stats(&self) {
        let mut state = self.lock();
        state.hits = 0;
        state.misses = 0;
    }

    /// Obtain a snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        let (pooled_buffers, pooled_bytes) = state
            .buckets
            .values()
            .flatten()
            .fold((0, 0), |(n, bytes), b| (n + 1, bytes + b.capacity_bytes()));
        PoolStats {
            hits: state.hits,
            misses: state.misses,
            pooled_buffers,
            pooled_bytes,
        }
    }
}
