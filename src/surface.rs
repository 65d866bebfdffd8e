//! [`Surface`]s, the frame handles decodes are rendered to.

use std::ffi::c_uint;

use crate::{
    driver::Driver,
    raw::{VAContextID, VASurfaceID},
    Device, Error, Result, VAError,
};

bitflags! {
    /// Surface pixel formats.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RTFormat: c_uint {
        const YUV420    = 0x00000001;
        const YUV422    = 0x00000002;
        const YUV444    = 0x00000004;
        const YUV411    = 0x00000008;
        const YUV400    = 0x00000010;
        const YUV420_10 = 0x00000100;
        const RGB32     = 0x00020000;
    }
}

/// Decode status of a [`Surface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// Nothing has been rendered to the surface yet.
    Idle,
    /// A picture is being accumulated for the surface, or its transaction is queued on the
    /// device and has not been drained yet.
    Rendering,
    /// Decoding finished.
    Ready,
    /// Submission (or decoding) of the surface's picture failed. Its content is undefined.
    Skipped,
}

/// A transaction that has been queued on the device and not yet drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InFlight {
    pub(crate) context: VAContextID,
    pub(crate) slot: usize,
}

/// A frame handle: one decode request's target picture.
#[derive(Debug)]
pub struct Surface {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) format: RTFormat,
    pub(crate) status: SurfaceStatus,
    /// Slot assigned by the last `begin_picture`.
    pub(crate) slot: Option<usize>,
    pub(crate) in_flight: Option<InFlight>,
    /// Bitstream bytes submitted with the last successful `end_picture`.
    pub(crate) bitstream_len: usize,
}

impl Surface {
    fn new(width: u32, height: u32, format: RTFormat) -> Self {
        Self {
            width,
            height,
            format,
            status: SurfaceStatus::Idle,
            slot: None,
            in_flight: None,
            bitstream_len: 0,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> RTFormat {
        self.format
    }

    #[inline]
    pub fn status(&self) -> SurfaceStatus {
        self.status
    }

    /// Returns the input slot assigned to the surface's last picture.
    #[inline]
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// Returns the number of bitstream bytes that were submitted for the surface's last picture.
    #[inline]
    pub fn bitstream_len(&self) -> usize {
        self.bitstream_len
    }
}

impl<D: Device> Driver<D> {
    /// Creates `count` [`Surface`]s of the given size and format.
    pub fn create_surfaces(
        &mut self,
        width: u32,
        height: u32,
        format: RTFormat,
        count: usize,
    ) -> Result<Vec<VASurfaceID>> {
        if format != RTFormat::YUV420 {
            return Err(Error::from(VAError::ERROR_UNSUPPORTED_RT_FORMAT));
        }

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            match self.surfaces.allocate(Surface::new(width, height, format)) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    for id in ids {
                        self.surfaces.free(id);
                    }
                    return Err(e);
                }
            }
        }
        log::trace!("created {count} {width}x{height} surfaces");
        Ok(ids)
    }

    /// Destroys [`Surface`]s.
    ///
    /// Fails with [`VAError::ERROR_SURFACE_BUSY`] without destroying anything if any of the
    /// surfaces still has a transaction queued on the device.
    pub fn destroy_surfaces(&mut self, surface_ids: &[VASurfaceID]) -> Result<()> {
        for &id in surface_ids {
            let surface = self
                .surfaces
                .get(id)
                .ok_or(Error::from(VAError::ERROR_INVALID_SURFACE))?;
            if surface.in_flight.is_some() {
                return Err(Error::from(VAError::ERROR_SURFACE_BUSY));
            }
        }
        for &id in surface_ids {
            self.surfaces.free(id);
        }
        Ok(())
    }

    pub fn surface(&self, surface_id: VASurfaceID) -> Option<&Surface> {
        self.surfaces.get(surface_id)
    }

    /// Returns the current [`SurfaceStatus`] without waiting for the device.
    pub fn query_surface_status(&self, surface_id: VASurfaceID) -> Result<SurfaceStatus> {
        self.surfaces
            .get(surface_id)
            .map(Surface::status)
            .ok_or(Error::from(VAError::ERROR_INVALID_SURFACE))
    }
}

#[cfg(test)]
mod tests {
    use crate::test::*;

    use super::*;

    #[test]
    fn create_and_destroy() {
        let (mut driver, _) = test_driver();
        let ids = driver
            .create_surfaces(TEST_WIDTH, TEST_HEIGHT, RTFormat::YUV420, 3)
            .unwrap();
        assert_eq!(ids.len(), 3);
        for &id in &ids {
            assert_eq!(driver.query_surface_status(id).unwrap(), SurfaceStatus::Idle);
            assert_eq!(driver.surface(id).unwrap().width(), TEST_WIDTH);
        }

        driver.destroy_surfaces(&ids).unwrap();
        assert_eq!(
            driver.query_surface_status(ids[0]).unwrap_err().status(),
            VAError::ERROR_INVALID_SURFACE
        );
    }

    #[test]
    fn unsupported_format() {
        let (mut driver, _) = test_driver();
        let err = driver
            .create_surfaces(TEST_WIDTH, TEST_HEIGHT, RTFormat::RGB32, 1)
            .unwrap_err();
        assert_eq!(err.status(), VAError::ERROR_UNSUPPORTED_RT_FORMAT);
    }
}
