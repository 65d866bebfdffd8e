//! Per-codec translation of client parameter buffers into device controls.

pub mod mpeg2;

use crate::{
    buffer::BufferType, device::Control, raw::VASurfaceID, Error, PixelFormat, Profile, Result,
    VAError,
};

/// The [`Profile`]s that have a [`CodecHandler`].
pub(crate) const SUPPORTED_PROFILES: &[Profile] = &[Profile::MPEG2Simple, Profile::MPEG2Main];

/// Maps reference pictures to the decoded-picture buffers they were decoded into.
pub struct References<'a> {
    surfaces: &'a [VASurfaceID],
    target: u32,
}

impl<'a> References<'a> {
    /// `surfaces` is the render target list of the session, `target` the picture buffer index of
    /// the picture being decoded.
    pub fn new(surfaces: &'a [VASurfaceID], target: u32) -> Self {
        Self { surfaces, target }
    }

    /// Returns the picture buffer index `surface` was decoded into.
    ///
    /// Pictures that are not part of the session resolve to the target picture itself.
    pub fn index_of(&self, surface: VASurfaceID) -> u32 {
        self.surfaces
            .iter()
            .position(|&id| id == surface)
            .map_or(self.target, |index| index as u32)
    }

    #[inline]
    pub fn target(&self) -> u32 {
        self.target
    }
}

/// Codec-specific part of a decode session.
///
/// A handler stages the parameters of the picture currently being accumulated and turns them
/// into the controls submitted with the picture's transaction.
pub trait CodecHandler {
    /// Pixel format of the compressed bitstream queue.
    fn device_format(&self) -> PixelFormat;

    /// Resets the staged parameters. Called when a new picture is begun.
    fn begin_frame(&mut self);

    /// Applies a parameter buffer to the staged parameters.
    ///
    /// Returns `Ok(false)` if the handler does not use buffers of type `ty`.
    fn apply_parameters(&mut self, ty: BufferType, data: &[u8], refs: &References<'_>)
        -> Result<bool>;

    /// Builds the device controls for the staged picture, with `bitstream_len` bytes of
    /// bitstream data.
    fn encode_control_structure(&self, bitstream_len: usize) -> Vec<Control>;
}

/// Returns the [`CodecHandler`] for `profile`.
pub fn handler_for(profile: Profile, width: u32, height: u32) -> Result<Box<dyn CodecHandler>> {
    match profile {
        Profile::MPEG2Simple | Profile::MPEG2Main => {
            Ok(Box::new(mpeg2::Mpeg2Handler::new(width, height)?))
        }
        _ => Err(Error::from(VAError::ERROR_UNSUPPORTED_PROFILE)),
    }
}

/// Reads a `T` from the start of a parameter buffer.
pub(crate) fn read_param<T: bytemuck::AnyBitPattern>(data: &[u8]) -> Result<T> {
    data.get(..std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .ok_or(Error::from(VAError::ERROR_INVALID_BUFFER))
}
