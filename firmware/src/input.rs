//! Scancode buffer between the keyboard interrupt and the foreground.
//!
//! A fixed-size ring that sits between the IRQ1 handler (producer) and the
//! POST screens (consumer). Both sides run on one CPU but the producer can
//! preempt the consumer at any instruction, so the cursors are atomics and
//! the consumer commits each pop with a compare-exchange.
//!
//! The cursors count bytes pushed and consumed since the last reset and are
//! only reduced modulo the slot count when indexing. A consumer that stalls
//! while the producer laps the ring therefore sees a different cursor value
//! and retries, instead of committing a slot that was overwritten.

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Slots in the ring. One is always left empty, so seven bytes fit.
pub const SCANCODE_SLOTS: usize = 8;

/// Raw keyboard bytes, oldest first.
///
/// When the producer runs out of room it drops the oldest byte, never the
/// one it is pushing.
pub struct ScancodeRing {
    buf: [AtomicU8; SCANCODE_SLOTS],
    read: AtomicUsize,
    write: AtomicUsize,
}

#[inline]
const fn slot(cursor: usize) -> usize {
    cursor % SCANCODE_SLOTS
}

impl ScancodeRing {
    pub const fn new() -> Self {
        Self {
            buf: [const { AtomicU8::new(0) }; SCANCODE_SLOTS],
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    /// Producer side. Only the keyboard interrupt calls this.
    pub fn push(&self, scancode: u8) {
        let write = self.write.load(Ordering::Relaxed);
        self.buf[slot(write)].store(scancode, Ordering::Relaxed);
        let advanced = write.wrapping_add(1);
        self.write.store(advanced, Ordering::Release);

        // Full: push the read cursor past the oldest byte. If the consumer
        // moved it first there is nothing to drop.
        let read = self.read.load(Ordering::Acquire);
        if advanced.wrapping_sub(read) >= SCANCODE_SLOTS {
            let _ = self.read.compare_exchange(
                read,
                read.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
    }

    /// The oldest byte together with the cursor it was read at.
    fn front(&self) -> Option<(usize, u8)> {
        let read = self.read.load(Ordering::Acquire);
        if read == self.write.load(Ordering::Acquire) {
            return None;
        }
        Some((read, self.buf[slot(read)].load(Ordering::Relaxed)))
    }

    /// Consume the byte `front` returned at `cursor`. Fails if the producer
    /// dropped it in the meantime.
    fn commit(&self, cursor: usize) -> bool {
        self.read
            .compare_exchange(cursor, cursor.wrapping_add(1), Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Consumer side. Returns `None` when empty.
    pub fn pop(&self) -> Option<u8> {
        loop {
            let (cursor, scancode) = self.front()?;
            if self.commit(cursor) {
                return Some(scancode);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.read.load(Ordering::Acquire) == self.write.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Forget everything buffered. The producer must be held off (keyboard
    /// masked) while this runs.
    pub fn reset(&self) {
        self.read.store(0, Ordering::Release);
        self.write.store(0, Ordering::Release);
    }
}

impl Default for ScancodeRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Called from the keyboard interrupt once the controller has been drained
/// into the ring.
///
/// Runs in interrupt context: it must not block and must not wait on
/// anything the foreground holds.
pub trait InputHook: Sync {
    fn on_input(&self, scancodes: &ScancodeRing);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn drain(ring: &ScancodeRing) -> Vec<u8> {
        core::iter::from_fn(|| ring.pop()).collect()
    }

    #[test]
    fn bytes_come_back_in_order() {
        let ring = ScancodeRing::new();
        for b in [0x1C, 0x9C, 0xE0, 0x48, 0xE0, 0xC8, 0x01] {
            ring.push(b);
        }
        assert_eq!(ring.len(), 7);
        assert_eq!(drain(&ring), [0x1C, 0x9C, 0xE0, 0x48, 0xE0, 0xC8, 0x01]);
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn overflow_keeps_the_newest_seven() {
        let ring = ScancodeRing::new();
        for b in 1..=11u8 {
            ring.push(b);
        }
        assert_eq!(drain(&ring), [5, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn cursors_wrap_around_the_buffer() {
        let ring = ScancodeRing::new();
        let mut seen = Vec::new();
        for b in 0..20u8 {
            ring.push(b);
            seen.extend(ring.pop());
        }
        assert_eq!(seen, (0..20u8).collect::<Vec<_>>());

        ring.push(0xAA);
        ring.push(0xBB);
        assert_eq!(drain(&ring), [0xAA, 0xBB]);
    }

    #[test]
    fn stale_read_is_retried_after_the_producer_laps_the_ring() {
        let ring = ScancodeRing::new();
        ring.push(0x1C);
        let (cursor, byte) = ring.front().unwrap();
        assert_eq!(byte, 0x1C);

        // Enough interrupt traffic lands between the read and the commit to
        // drop a full ring's worth of bytes. The read slot is back where it
        // was but the cursor is not.
        for b in 0x20..0x2E {
            ring.push(b);
        }
        assert_eq!(slot(ring.read.load(Ordering::Relaxed)), slot(cursor));
        assert!(!ring.commit(cursor));
        assert_eq!(drain(&ring), [0x27, 0x28, 0x29, 0x2A, 0x2B, 0x2C, 0x2D]);
    }

    #[test]
    fn reset_empties_the_ring() {
        let ring = ScancodeRing::new();
        ring.push(0x3B);
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), None);
    }
}
