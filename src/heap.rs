//! Handle tables for driver objects.
//!
//! Every object the client can refer to (configs, contexts, surfaces and buffers) lives in an
//! [`ObjectHeap`] and is identified by an opaque ID. IDs of different object types never collide,
//! since every heap adds its own offset to the slot index.

use crate::{raw::VAGenericID, Error, Result, VAError};

pub const CONFIG_ID_OFFSET: VAGenericID = 0x0100_0000;
pub const CONTEXT_ID_OFFSET: VAGenericID = 0x0200_0000;
pub const SURFACE_ID_OFFSET: VAGenericID = 0x0400_0000;
pub const BUFFER_ID_OFFSET: VAGenericID = 0x0800_0000;

/// A table of objects of type `T`, addressed by ID.
///
/// Freed slots are reused, most recently freed first.
pub struct ObjectHeap<T> {
    offset: VAGenericID,
    limit: usize,
    slots: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> ObjectHeap<T> {
    pub fn new(offset: VAGenericID, limit: usize) -> Self {
        Self {
            offset,
            limit,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Stores `object` in the heap and returns its new ID.
    pub fn allocate(&mut self, object: T) -> Result<VAGenericID> {
        self.allocate_with(|_| Ok(object))
    }

    /// Reserves an ID, then builds the object to store under it.
    ///
    /// If `build` fails, the reserved ID is released again before the error is returned, so a
    /// failed construction never leaves an entry behind.
    pub fn allocate_with(
        &mut self,
        build: impl FnOnce(VAGenericID) -> Result<T>,
    ) -> Result<VAGenericID> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < self.limit => {
                self.slots.push(None);
                self.slots.len() - 1
            }
            None => return Err(Error::from(VAError::ERROR_ALLOCATION_FAILED)),
        };
        let id = self.offset + index as VAGenericID;

        match build(id) {
            Ok(object) => {
                self.slots[index] = Some(object);
                Ok(id)
            }
            Err(e) => {
                self.free.push(index);
                Err(e)
            }
        }
    }

    fn index(&self, id: VAGenericID) -> Option<usize> {
        let index = id.checked_sub(self.offset)? as usize;
        (index < self.slots.len()).then_some(index)
    }

    pub fn get(&self, id: VAGenericID) -> Option<&T> {
        self.slots[self.index(id)?].as_ref()
    }

    pub fn get_mut(&mut self, id: VAGenericID) -> Option<&mut T> {
        let index = self.index(id)?;
        self.slots[index].as_mut()
    }

    pub fn contains(&self, id: VAGenericID) -> bool {
        self.get(id).is_some()
    }

    /// Removes the object with the given ID and returns it.
    pub fn free(&mut self, id: VAGenericID) -> Option<T> {
        let index = self.index(id)?;
        let object = self.slots[index].take()?;
        self.free.push(index);
        Some(object)
    }

    /// Returns the number of live objects.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
