//! Fixed-capacity, thread-safe FIFO buffer with blocking `put`/`take`.
//!
//! All state lives behind one mutex; `not_empty` parks takers and
//! `not_full` parks putters. Size queries are snapshots and only advisory.
//! Decisions that must be consistent with a removal (replenishment) are
//! made by [`BoundedBuffer::take_and_reserve`] under the same lock as the
//! removal itself. Reserved slots hold real space: plain `put`s treat them
//! as occupied, so a reservation can always be fulfilled.

use super::errors::{FactoryError, Result};
use super::shutdown::Closeable;
use log::{debug, info};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

struct BufferState<T> {
    items: VecDeque<T>,
    /// Restock slots promised to dealers but not yet filled
    reserved: usize,
    closed: bool,
}

pub struct BoundedBuffer<T> {
    name: String,
    capacity: usize,
    state: Mutex<BufferState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedBuffer<T> {
    /// Create an empty buffer. Fails with `InvalidConfig` if `capacity` is 0.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self> {
        let name = name.into();
        if capacity == 0 {
            return Err(FactoryError::InvalidConfig(format!(
                "buffer '{}' capacity must be greater than 0",
                name
            )));
        }

        Ok(Self {
            name,
            capacity,
            state: Mutex::new(BufferState {
                items: VecDeque::with_capacity(capacity),
                reserved: 0,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `item`, blocking while stocked items plus outstanding
    /// reservations fill the buffer.
    ///
    /// Returns `Cancelled` if the buffer is closed before space frees up;
    /// the item is dropped in that case.
    pub fn put(&self, item: T) -> Result<()> {
        self.push(item, false)
    }

    /// Remove and return the oldest item, blocking while the buffer is empty.
    ///
    /// Returns `Cancelled` once the buffer is closed, even if items remain.
    pub fn take(&self) -> Result<T> {
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.closed {
            self.not_empty.wait(&mut state);
        }
        if state.closed {
            return Err(FactoryError::Cancelled);
        }

        let item = state.items.pop_front().ok_or(FactoryError::Cancelled)?;
        let remaining = state.items.len();
        drop(state);
        self.not_full.notify_all();

        debug!("[Buffer:{}] Took item (count: {}/{})", self.name, remaining, self.capacity);
        Ok(item)
    }

    /// Take the oldest item and, in the same critical section, reserve the
    /// restock slots needed to bring the buffer back to `target`.
    ///
    /// The deficit counts both stocked items and slots already reserved by
    /// other callers, so concurrent dealers never promise more than
    /// `target` in total. `target` is clamped to the buffer capacity.
    pub fn take_and_reserve(&self, target: usize) -> Result<(T, Reservation<'_, T>)> {
        let target = target.min(self.capacity);
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.closed {
            self.not_empty.wait(&mut state);
        }
        if state.closed {
            return Err(FactoryError::Cancelled);
        }

        let item = state.items.pop_front().ok_or(FactoryError::Cancelled)?;
        let stocked = state.items.len() + state.reserved;
        let deficit = target.saturating_sub(stocked);
        state.reserved += deficit;
        let remaining = state.items.len();
        drop(state);
        self.not_full.notify_all();

        if deficit > 0 {
            debug!(
                "[Buffer:{}] Took item (count: {}/{}), reserved {} restock slot(s) toward {}",
                self.name, remaining, self.capacity, deficit, target
            );
        }
        Ok((
            item,
            Reservation {
                buffer: self,
                remaining: deficit,
            },
        ))
    }

    /// Snapshot of the number of stocked items
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// True when a plain `put` would block
    pub fn is_full(&self) -> bool {
        let state = self.state.lock();
        state.items.len() + state.reserved >= self.capacity
    }

    /// Snapshot of outstanding restock reservations
    pub fn reserved(&self) -> usize {
        self.state.lock().reserved
    }

    /// Slots open to plain `put`s
    pub fn available_space(&self) -> usize {
        let state = self.state.lock();
        self.capacity.saturating_sub(state.items.len() + state.reserved)
    }

    /// Close the buffer and wake every blocked `put` and `take`. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let left = state.items.len();
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        info!("[Buffer:{}] Closed with {} item(s) left", self.name, left);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Remove every stocked item, oldest first
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let items: Vec<T> = state.items.drain(..).collect();
        drop(state);
        self.not_full.notify_all();
        items
    }

    fn push(&self, item: T, fills_reservation: bool) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            let occupied = if fills_reservation {
                state.items.len()
            } else {
                state.items.len() + state.reserved
            };
            if occupied < self.capacity || state.closed {
                break;
            }
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(FactoryError::Cancelled);
        }

        state.items.push_back(item);
        if fills_reservation {
            state.reserved = state.reserved.saturating_sub(1);
        }
        let count = state.items.len();
        drop(state);
        self.not_empty.notify_one();

        debug!("[Buffer:{}] Added item (count: {}/{})", self.name, count, self.capacity);
        Ok(())
    }

    fn release(&self, slots: usize) {
        let mut state = self.state.lock();
        state.reserved = state.reserved.saturating_sub(slots);
        drop(state);
        self.not_full.notify_all();
    }
}

impl<T: Send> Closeable for BoundedBuffer<T> {
    fn close(&self) {
        BoundedBuffer::close(self);
    }
}

impl<T> std::fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BoundedBuffer")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &state.items.len())
            .field("reserved", &state.reserved)
            .field("closed", &state.closed)
            .finish()
    }
}

/// Restock slots reserved by [`BoundedBuffer::take_and_reserve`].
///
/// Each [`Reservation::fulfill`] puts one item and consumes one slot.
/// Slots still open when the reservation is dropped are released.
#[must_use = "unfilled restock slots are released when the reservation drops"]
pub struct Reservation<'a, T> {
    buffer: &'a BoundedBuffer<T>,
    remaining: usize,
}

impl<'a, T> Reservation<'a, T> {
    /// Slots still to be filled
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_fulfilled(&self) -> bool {
        self.remaining == 0
    }

    /// Put one restock item into the buffer, blocking while it is full.
    ///
    /// Once every slot is filled this behaves like a plain `put`.
    pub fn fulfill(&mut self, item: T) -> Result<()> {
        if self.remaining == 0 {
            return self.buffer.put(item);
        }
        self.buffer.push(item, true)?;
        self.remaining -= 1;
        Ok(())
    }
}

impl<'a, T> Drop for Reservation<'a, T> {
    fn drop(&mut self) {
        if self.remaining > 0 {
            self.buffer.release(self.remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = BoundedBuffer::<u32>::new("empty", 0);
        assert!(matches!(result, Err(FactoryError::InvalidConfig(_))));
    }

    #[test]
    fn test_fifo_order() {
        let buffer = BoundedBuffer::new("fifo", 4).unwrap();
        buffer.put("A").unwrap();
        buffer.put("B").unwrap();
        assert_eq!(buffer.take().unwrap(), "A");
        assert_eq!(buffer.take().unwrap(), "B");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_capacity_queries() {
        let buffer = BoundedBuffer::new("queries", 2).unwrap();
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
        assert_eq!(buffer.available_space(), 2);

        buffer.put(1).unwrap();
        buffer.put(2).unwrap();
        assert!(buffer.is_full());
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.available_space(), 0);
    }

    #[test]
    fn test_take_blocks_until_put() {
        let buffer = Arc::new(BoundedBuffer::new("blocking-take", 1).unwrap());
        let taker = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.take())
        };

        thread::sleep(Duration::from_millis(30));
        assert!(!taker.is_finished());

        buffer.put(7).unwrap();
        assert_eq!(taker.join().unwrap().unwrap(), 7);
    }

    #[test]
    fn test_put_blocks_while_full() {
        let buffer = Arc::new(BoundedBuffer::new("blocking-put", 1).unwrap());
        buffer.put(1).unwrap();

        let putter = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.put(2))
        };

        thread::sleep(Duration::from_millis(30));
        assert!(!putter.is_finished());
        assert_eq!(buffer.len(), 1);

        assert_eq!(buffer.take().unwrap(), 1);
        putter.join().unwrap().unwrap();
        assert_eq!(buffer.take().unwrap(), 2);
    }

    #[test]
    fn test_close_wakes_blocked_take_and_put() {
        let empty = Arc::new(BoundedBuffer::<u32>::new("closing-empty", 1).unwrap());
        let full = Arc::new(BoundedBuffer::new("closing-full", 1).unwrap());
        full.put(1).unwrap();

        let taker = {
            let empty = Arc::clone(&empty);
            thread::spawn(move || empty.take())
        };
        let putter = {
            let full = Arc::clone(&full);
            thread::spawn(move || full.put(2))
        };

        thread::sleep(Duration::from_millis(30));
        empty.close();
        full.close();

        assert!(matches!(taker.join().unwrap(), Err(FactoryError::Cancelled)));
        assert!(matches!(putter.join().unwrap(), Err(FactoryError::Cancelled)));
        assert_eq!(full.drain(), vec![1]);
    }

    #[test]
    fn test_reserve_computes_exact_deficit() {
        let buffer = BoundedBuffer::new("shovels", 100).unwrap();
        for i in 0..41 {
            buffer.put(i).unwrap();
        }

        let (sold, reservation) = buffer.take_and_reserve(50).unwrap();
        assert_eq!(sold, 0);
        assert_eq!(buffer.len(), 40);
        assert_eq!(reservation.remaining(), 10);
        assert_eq!(buffer.reserved(), 10);

        // Outstanding slots count as stock for the next decision
        let (_, second) = buffer.take_and_reserve(50).unwrap();
        assert_eq!(second.remaining(), 1);
        assert_eq!(buffer.reserved(), 11);
    }

    #[test]
    fn test_fulfilled_reservation_restores_target() {
        let buffer = BoundedBuffer::new("restock", 10).unwrap();
        for i in 0..5 {
            buffer.put(i).unwrap();
        }

        let (_, mut reservation) = buffer.take_and_reserve(5).unwrap();
        assert_eq!(reservation.remaining(), 1);
        reservation.fulfill(99).unwrap();
        assert!(reservation.is_fulfilled());
        drop(reservation);

        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.reserved(), 0);
    }

    #[test]
    fn test_dropped_reservation_releases_slots() {
        let buffer = BoundedBuffer::new("released", 10).unwrap();
        buffer.put(1).unwrap();

        let (_, reservation) = buffer.take_and_reserve(8).unwrap();
        assert_eq!(reservation.remaining(), 8);
        drop(reservation);
        assert_eq!(buffer.reserved(), 0);
    }

    #[test]
    fn test_reserved_slots_block_plain_puts() {
        let buffer = Arc::new(BoundedBuffer::new("shovels", 2).unwrap());
        buffer.put(1).unwrap();
        buffer.put(2).unwrap();

        let (_, mut reservation) = buffer.take_and_reserve(2).unwrap();
        assert_eq!(reservation.remaining(), 1);
        assert!(buffer.is_full());
        assert_eq!(buffer.available_space(), 0);

        // An assembler racing the restock must wait behind the reserved slot
        let assembler = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.put(3))
        };
        thread::sleep(Duration::from_millis(30));
        assert!(!assembler.is_finished());
        assert_eq!(buffer.len(), 1);

        reservation.fulfill(99).unwrap();
        drop(reservation);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.reserved(), 0);

        assert_eq!(buffer.take().unwrap(), 2);
        assembler.join().unwrap().unwrap();
        assert_eq!(buffer.take().unwrap(), 99);
        assert_eq!(buffer.take().unwrap(), 3);
    }

    #[test]
    fn test_released_reservation_wakes_plain_put() {
        let buffer = Arc::new(BoundedBuffer::new("released-wake", 1).unwrap());
        buffer.put(1).unwrap();
        let (_, reservation) = buffer.take_and_reserve(1).unwrap();

        let putter = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.put(2))
        };
        thread::sleep(Duration::from_millis(30));
        assert!(!putter.is_finished());

        drop(reservation);
        putter.join().unwrap().unwrap();
        assert_eq!(buffer.take().unwrap(), 2);
    }

    #[test]
    fn test_no_deficit_above_target() {
        let buffer = BoundedBuffer::new("stocked", 10).unwrap();
        for i in 0..8 {
            buffer.put(i).unwrap();
        }
        let (_, reservation) = buffer.take_and_reserve(5).unwrap();
        assert!(reservation.is_fulfilled());
    }

    #[test]
    fn test_reserve_target_clamped_to_capacity() {
        let buffer = BoundedBuffer::new("clamped", 3).unwrap();
        buffer.put(1).unwrap();
        let (_, reservation) = buffer.take_and_reserve(50).unwrap();
        assert_eq!(reservation.remaining(), 3);
    }
}
