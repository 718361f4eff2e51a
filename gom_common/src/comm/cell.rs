//! Single-writer, many-reader tear-free cell.
//!
//! The writer bumps `head`, writes the body, then writes `tail = head`. A
//! reader copies the body bracketed by a `tail`-then-`head` load pair: if
//! the two guards agree, no write overlapped the copy and the snapshot is
//! consistent. Readers never block and the writer never waits; a torn read
//! simply keeps the previous good snapshot.
//!
//! This is the in-process form of the controller's shared-memory ABI: the
//! guard discipline is what external collaborators see, so it is kept
//! observable rather than hidden behind a lock.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering, fence};

/// A guarded record. `T` must be `Copy` (plain data, no drop glue).
#[repr(C)]
pub struct CommCell<T: Copy> {
    head: AtomicU32,
    body: UnsafeCell<T>,
    tail: AtomicU32,
}

// Single-writer discipline is enforced by ownership at the call sites:
// exactly one task holds the writer role for each cell.
unsafe impl<T: Copy + Send> Sync for CommCell<T> {}

impl<T: Copy> CommCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            head: AtomicU32::new(0),
            body: UnsafeCell::new(initial),
            tail: AtomicU32::new(0),
        }
    }

    /// Publish a new value. Must only be called from the owning writer.
    pub fn write(&self, value: &T) {
        let seq = self.head.load(Ordering::Relaxed).wrapping_add(1);
        self.head.store(seq, Ordering::Relaxed);
        fence(Ordering::Release);
        unsafe {
            std::ptr::write_volatile(self.body.get(), *value);
        }
        self.tail.store(seq, Ordering::Release);
    }

    /// Copy the current body into `out`. Returns true if the guards
    /// bracket a consistent snapshot.
    pub fn read_into(&self, out: &mut T) -> bool {
        let tail = self.tail.load(Ordering::Acquire);
        unsafe {
            *out = std::ptr::read_volatile(self.body.get());
        }
        fence(Ordering::Acquire);
        let head = self.head.load(Ordering::Relaxed);
        head == tail
    }

    /// Current publication count, for change detection.
    #[inline]
    pub fn sequence(&self) -> u32 {
        self.tail.load(Ordering::Acquire)
    }
}

/// Double-buffered reader that always has a consistent snapshot on hand.
///
/// A torn read leaves the previous good buffer in place, so `get` never
/// observes a half-written record.
#[derive(Debug, Clone, Copy)]
pub struct PingPongReader<T: Copy> {
    bufs: [T; 2],
    good: usize,
    /// Count of torn reads retained for diagnostics.
    torn: u64,
}

impl<T: Copy> PingPongReader<T> {
    pub fn new(initial: T) -> Self {
        Self { bufs: [initial, initial], good: 0, torn: 0 }
    }

    /// Poll the cell once; on success the fresh snapshot becomes current.
    pub fn update(&mut self, cell: &CommCell<T>) -> bool {
        let scratch = 1 - self.good;
        let mut tmp = self.bufs[scratch];
        if cell.read_into(&mut tmp) {
            self.bufs[scratch] = tmp;
            self.good = scratch;
            true
        } else {
            self.torn += 1;
            false
        }
    }

    /// The most recent consistent snapshot.
    #[inline]
    pub fn get(&self) -> &T {
        &self.bufs[self.good]
    }

    /// How many torn reads were retained so far.
    #[inline]
    pub fn torn_count(&self) -> u64 {
        self.torn
    }
}
