//! Client buffers.
//!
//! A [`Buffer`] is an opaque blob handed to the driver by the client, tagged with a
//! [`BufferType`]. Buffers are consumed by [`Driver::render_picture`].
//!
//! [`Driver::render_picture`]: crate::driver::Driver::render_picture

use std::ffi::c_int;

use crate::{
    driver::Driver,
    raw::{VABufferID, VAContextID},
    Device, Error, Result, VAError,
};

ffi_enum! {
    /// Enumeration of the buffer types VA-API understands (decode subset).
    pub enum BufferType: c_int {
        PictureParameter    = 0,
        IQMatrix            = 1,
        BitPlane            = 2,
        SliceGroupMap       = 3,
        SliceParameter      = 4,
        SliceData           = 5,
        MacroblockParameter = 6,
        ResidualData        = 7,
        DeblockingParameter = 8,
        Image               = 9,
        ProtectedSliceData  = 10,
        QMatrix             = 11,
        HuffmanTable        = 12,
        Probability         = 13,
    }
}

/// A buffer object owned by a decode context.
pub struct Buffer {
    pub(crate) ty: BufferType,
    pub(crate) context: VAContextID,
    pub(crate) data: Vec<u8>,
}

impl Buffer {
    #[inline]
    pub fn ty(&self) -> BufferType {
        self.ty
    }

    #[inline]
    pub fn context(&self) -> VAContextID {
        self.context
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl<D: Device> Driver<D> {
    /// Creates a [`Buffer`] of type `ty` for `context`, holding a copy of `data`.
    pub fn create_buffer(
        &mut self,
        context: VAContextID,
        ty: BufferType,
        data: &[u8],
    ) -> Result<VABufferID> {
        if !self.contexts.contains(context) {
            return Err(Error::from(VAError::ERROR_INVALID_CONTEXT));
        }

        self.buffers.allocate(Buffer {
            ty,
            context,
            data: data.to_vec(),
        })
    }

    pub fn destroy_buffer(&mut self, buffer_id: VABufferID) -> Result<()> {
        self.buffers
            .free(buffer_id)
            .map(drop)
            .ok_or(Error::from(VAError::ERROR_INVALID_BUFFER))
    }

    pub fn buffer(&self, buffer_id: VABufferID) -> Option<&Buffer> {
        self.buffers.get(buffer_id)
    }

    /// Replaces the contents of a [`Buffer`].
    pub fn buffer_data(&mut self, buffer_id: VABufferID, data: &[u8]) -> Result<()> {
        let buffer = self
            .buffers
            .get_mut(buffer_id)
            .ok_or(Error::from(VAError::ERROR_INVALID_BUFFER))?;
        buffer.data.clear();
        buffer.data.extend_from_slice(data);
        Ok(())
    }
}
