//! Scratch buffer pooling for outgoing frames.
//!
//! The engine leases one buffer per frame written and hands it back as soon as
//! the write finishes or fails. The allocation policy behind the lease is
//! pluggable through [`BufferPool`].

use std::sync::{Mutex, PoisonError};

/// Contract the engine needs from a buffer pool.
pub trait BufferPool: Send + Sync {
    /// Hand out a buffer whose length is at least `min_size`.
    ///
    /// Contents are unspecified.
    fn rent(&self, min_size: usize) -> Vec<u8>;

    /// Take a buffer back. The pool may keep or drop it.
    fn release(&self, buf: Vec<u8>);
}

/// Default pool: a bounded free list guarded by a mutex.
#[derive(Debug)]
pub struct SharedBufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_buffers: usize,
    max_retained_capacity: usize,
}

impl Default for SharedBufferPool {
    fn default() -> Self {
        Self::new(16, 64 * 1024)
    }
}

impl SharedBufferPool {
    /// Keep at most `max_buffers` idle buffers, none larger than
    /// `max_retained_capacity` bytes.
    #[must_use]
    pub fn new(max_buffers: usize, max_retained_capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_buffers)),
            max_buffers,
            max_retained_capacity,
        }
    }

    /// Number of idle buffers currently held.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl BufferPool for SharedBufferPool {
    fn rent(&self, min_size: usize) -> Vec<u8> {
        let reused = {
            let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
            let idx = free.iter().position(|buf| buf.capacity() >= min_size);
            idx.map(|idx| free.swap_remove(idx))
        };

        let mut buf = reused.unwrap_or_else(|| Vec::with_capacity(min_size));
        buf.resize(min_size, 0);
        buf
    }

    fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.max_retained_capacity {
            return;
        }
        buf.clear();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_buffers {
            free.push(buf);
        }
    }
}

/// A leased buffer that returns itself to its pool when dropped.
pub struct PooledBuffer<'a> {
    pool: &'a dyn BufferPool,
    buf: Option<Vec<u8>>,
}

impl<'a> PooledBuffer<'a> {
    /// Lease a buffer of at least `min_size` bytes.
    #[must_use]
    pub fn lease(pool: &'a dyn BufferPool, min_size: usize) -> Self {
        Self {
            pool,
            buf: Some(pool.rent(min_size)),
        }
    }
}

impl std::ops::Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl std::ops::DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
