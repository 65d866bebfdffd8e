//! The input slot ring.
//!
//! A decode session owns a fixed number of bitstream buffers on the device. Pictures are
//! assigned to them round-robin: picture `n` uses slot `n % N`. Each slot also keeps the
//! transaction handle last used with it, so handles are only created once per slot.
//!
//! A slot may only be reassigned after the transaction occupying it has been drained; the ring
//! tracks occupancy, the submission pipeline enforces the rule.

use crate::{raw::VASurfaceID, Error, Result, VAError};

/// One input buffer of the ring.
#[derive(Debug)]
pub struct Slot<R> {
    /// Transaction handle, created on the first submission through this slot.
    pub(crate) request: Option<R>,
    /// Bytes of bitstream data written into the buffer so far.
    pub(crate) offset: usize,
    /// Surface whose picture currently uses the slot.
    pub(crate) occupant: Option<VASurfaceID>,
    /// The slot's transaction has been queued and not yet drained.
    pub(crate) in_flight: bool,
}

impl<R> Slot<R> {
    fn new() -> Self {
        Self {
            request: None,
            offset: 0,
            occupant: None,
            in_flight: false,
        }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn occupant(&self) -> Option<VASurfaceID> {
        self.occupant
    }

    #[inline]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    #[inline]
    pub fn request(&self) -> Option<&R> {
        self.request.as_ref()
    }

    /// Returns the slot to the idle state, keeping its transaction handle.
    pub(crate) fn release(&mut self) {
        self.offset = 0;
        self.occupant = None;
        self.in_flight = false;
    }
}

/// A fixed ring of [`Slot`]s, indexed by a wrapping submission counter.
#[derive(Debug)]
pub struct SlotRing<R> {
    slots: Vec<Slot<R>>,
    counter: u64,
}

impl<R> SlotRing<R> {
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "slot ring must not be empty");
        Self {
            slots: (0..len).map(|_| Slot::new()).collect(),
            counter: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Number of pictures begun so far.
    #[inline]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Number of slots whose transaction has been queued and not yet drained.
    pub fn num_in_flight(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_flight).count()
    }

    /// Index of the slot the next picture will be assigned to.
    pub fn next_index(&self) -> usize {
        (self.counter % self.slots.len() as u64) as usize
    }

    /// Assigns the next slot to `surface` and advances the counter.
    ///
    /// The slot must have been drained; the caller is responsible for synchronizing the previous
    /// occupant first.
    pub(crate) fn acquire(&mut self, surface: VASurfaceID) -> usize {
        let index = self.next_index();
        let slot = &mut self.slots[index];
        debug_assert!(!slot.in_flight, "slot {index} reassigned while in flight");
        slot.release();
        slot.occupant = Some(surface);
        self.counter = self.counter.wrapping_add(1);
        index
    }

    /// Appends bitstream data to a slot's `buffer`.
    pub(crate) fn append(&mut self, index: usize, buffer: &mut [u8], data: &[u8]) -> Result<()> {
        let slot = &mut self.slots[index];
        let end = slot.offset + data.len();
        let Some(dest) = buffer.get_mut(slot.offset..end) else {
            log::error!(
                "slot {index}: {} bytes of bitstream do not fit into {} byte buffer",
                end,
                buffer.len()
            );
            return Err(Error::from(VAError::ERROR_NOT_ENOUGH_BUFFER));
        };
        dest.copy_from_slice(data);
        slot.offset = end;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Slot<R>> {
        self.slots.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Slot<R>> {
        self.slots.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin() {
        let mut ring = SlotRing::<()>::new(3);
        let indices: Vec<_> = (0..7).map(|surface| ring.acquire(surface)).collect();
        assert_eq!(indices, [0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(ring.counter(), 7);
        assert_eq!(ring.next_index(), 1);
        assert_eq!(ring.get(0).unwrap().occupant(), Some(6));
    }

    #[test]
    fn append_accumulates() {
        let mut ring = SlotRing::<()>::new(2);
        let mut buffer = [0u8; 8];
        let index = ring.acquire(1);
        ring.append(index, &mut buffer, &[1, 2, 3]).unwrap();
        ring.append(index, &mut buffer, &[4, 5]).unwrap();
        assert_eq!(ring.get(index).unwrap().offset(), 5);
        assert_eq!(buffer, [1, 2, 3, 4, 5, 0, 0, 0]);

        let err = ring.append(index, &mut buffer, &[0; 4]).unwrap_err();
        assert_eq!(err.status(), VAError::ERROR_NOT_ENOUGH_BUFFER);
        assert_eq!(ring.get(index).unwrap().offset(), 5);
    }

    #[test]
    fn reacquire_resets_offset_and_keeps_request() {
        let mut ring = SlotRing::<u32>::new(1);
        let mut buffer = [0u8; 4];
        ring.acquire(1);
        ring.append(0, &mut buffer, &[1, 2]).unwrap();
        ring.get_mut(0).unwrap().request = Some(42);

        ring.acquire(2);
        let slot = ring.get(0).unwrap();
        assert_eq!(slot.offset(), 0);
        assert_eq!(slot.occupant(), Some(2));
        assert_eq!(slot.request(), Some(&42));
    }
}
