//! Pooled render buffers.
//!
//! Bounds allocation churn under sustained load without capping concurrency:
//! acquisition never blocks, an empty free list just allocates a fresh
//! buffer, and at most `max_idle` buffers are retained.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

/// Number of buffers kept on the free list.
const POOL_SIZE: usize = 32;
/// Initial capacity of each pooled buffer.
const BUF_CAPACITY: usize = 10 * 1024;

#[derive(Clone)]
pub struct BufferPool {
    free: Arc<Mutex<Vec<Vec<u8>>>>,
    capacity: usize,
    max_idle: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_config(POOL_SIZE, BUF_CAPACITY)
    }

    pub fn with_config(max_idle: usize, capacity: usize) -> Self {
        Self {
            free: Arc::new(Mutex::new(Vec::with_capacity(max_idle))),
            capacity,
            max_idle,
        }
    }

    /// Take a buffer, allocating when the free list is empty.
    pub fn get(&self) -> PooledBuf {
        let buf = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.capacity));
        PooledBuf {
            buf,
            pool: self.clone(),
        }
    }

    fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(buf);
        }
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A buffer on loan from the pool, returned on drop regardless of exit path.
pub struct PooledBuf {
    buf: Vec<u8>,
    pool: BufferPool,
}

impl Deref for PooledBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}
