//! Decode sessions.
//!
//! A [`Context`] binds a picture size and a codec [`Profile`][crate::Profile] to its own decoder
//! [`Device`] instance. Both device queues stream for the whole lifetime of the context.

use crate::{
    codec::{self, CodecHandler},
    device::{Format, QueueType},
    driver::{log_err, Driver, DriverOptions},
    raw::{VAConfigID, VAContextID, VASurfaceID},
    slot::SlotRing,
    surface::SurfaceStatus,
    Device, Error, Result, VAError,
};

/// Maximum number of render targets of a context.
///
/// Reference pictures are passed to the device as byte-sized picture buffer indices.
pub const MAX_RENDER_TARGETS: usize = u8::MAX as usize + 1;

/// A decode session.
///
/// Submit work to a context with [`Driver::begin_picture`], [`Driver::render_picture`] and
/// [`Driver::end_picture`].
pub struct Context<D: Device> {
    pub(crate) config: VAConfigID,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) flags: i32,
    /// Bound render targets. The surface at position `i` decodes into picture buffer `i`.
    pub(crate) surfaces: Vec<VASurfaceID>,
    pub(crate) device: D,
    pub(crate) ring: SlotRing<D::Request>,
    pub(crate) handler: Box<dyn CodecHandler>,
    /// The surface whose picture is currently being accumulated.
    pub(crate) current: Option<VASurfaceID>,
}

impl<D: Device> Context<D> {
    #[inline]
    pub fn config(&self) -> VAConfigID {
        self.config
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
    pub fn flags(&self) -> i32 {
        self.flags
    }

    #[inline]
    pub fn surfaces(&self) -> &[VASurfaceID] {
        &self.surfaces
    }

    #[inline]
    pub fn ring(&self) -> &SlotRing<D::Request> {
        &self.ring
    }

    /// Returns the surface whose picture is being accumulated, if any.
    #[inline]
    pub fn current(&self) -> Option<VASurfaceID> {
        self.current
    }

    /// Returns the picture buffer index `surface` decodes into.
    pub(crate) fn capture_index(&self, surface: VASurfaceID) -> Option<usize> {
        self.surfaces.iter().position(|&id| id == surface)
    }
}

/// Programs both queues of a freshly opened device and starts streaming.
fn setup_device<D: Device>(
    device: &mut D,
    options: &DriverOptions,
    bitstream_format: Format,
    num_surfaces: usize,
) -> Result<()> {
    device.set_format(QueueType::Bitstream, &bitstream_format)?;
    let count = device.allocate_buffers(QueueType::Bitstream, options.input_slots as u32)?;
    if count as usize != options.input_slots {
        log::error!(
            "device allocated {count} bitstream buffers, {} are needed",
            options.input_slots
        );
        return Err(Error::from(VAError::ERROR_UNKNOWN));
    }

    if num_surfaces != 0 {
        device.set_format(
            QueueType::Picture,
            &Format {
                pixel_format: options.capture_format,
                width: bitstream_format.width,
                height: bitstream_format.height,
                num_planes: options.capture_planes,
                size_image: 0,
            },
        )?;
        let count = device.allocate_buffers(QueueType::Picture, num_surfaces as u32)?;
        if (count as usize) < num_surfaces {
            log::error!("device allocated {count} picture buffers, {num_surfaces} are needed");
            return Err(Error::from(VAError::ERROR_UNKNOWN));
        }
    }

    device.stream_on(QueueType::Bitstream)?;
    device.stream_on(QueueType::Picture)?;
    Ok(())
}

impl<D: Device> Driver<D> {
    /// Creates a decode [`Context`] for `config_id`, rendering to `surfaces`.
    ///
    /// The configuration and surfaces are validated before anything is allocated. A failure
    /// while setting up the device is reported as [`VAError::ERROR_UNKNOWN`]; the device
    /// instance is closed again and no context is created.
    pub fn create_context(
        &mut self,
        config_id: VAConfigID,
        width: u32,
        height: u32,
        flags: i32,
        surfaces: &[VASurfaceID],
    ) -> Result<VAContextID> {
        let config = *self
            .configs
            .get(config_id)
            .ok_or(Error::from(VAError::ERROR_INVALID_CONFIG))?;

        let surface_table = &self.surfaces;
        let options = &self.options;
        let open_device = &mut *self.open_device;
        self.contexts.allocate_with(|id| {
            if let Some(&invalid) = surfaces.iter().find(|&&s| !surface_table.contains(s)) {
                log::debug!("context {id:#x}: invalid render target {invalid:#x}");
                return Err(Error::from(VAError::ERROR_INVALID_SURFACE));
            }
            if surfaces.len() > MAX_RENDER_TARGETS {
                log::debug!(
                    "context {id:#x}: {} render targets, at most {MAX_RENDER_TARGETS} are supported",
                    surfaces.len()
                );
                return Err(Error::from(VAError::ERROR_MAX_NUM_EXCEEDED));
            }

            let handler = codec::handler_for(config.profile, width, height)?;
            let bitstream_format = Format {
                pixel_format: handler.device_format(),
                width,
                height,
                num_planes: 1,
                size_image: options.input_buffer_size,
            };

            let device = open_device(options).and_then(|mut device| {
                setup_device(&mut device, options, bitstream_format, surfaces.len())?;
                Ok(device)
            });
            let device = match device {
                Ok(device) => device,
                Err(e) => {
                    log::error!("context {id:#x}: device setup failed: {e}");
                    return Err(Error::from(VAError::ERROR_UNKNOWN));
                }
            };

            log::debug!(
                "created context {id:#x}: {:?} {width}x{height}, {} render targets, {} input slots",
                config.profile,
                surfaces.len(),
                options.input_slots,
            );
            Ok(Context {
                config: config_id,
                width,
                height,
                flags,
                surfaces: surfaces.to_vec(),
                device,
                ring: SlotRing::new(options.input_slots),
                handler,
                current: None,
            })
        })
    }

    /// Destroys a decode [`Context`].
    ///
    /// Streaming is stopped on both queues; failures to do so are logged and ignored. Pictures
    /// of the context that have not been drained yet are marked [`SurfaceStatus::Skipped`].
    pub fn destroy_context(&mut self, context_id: VAContextID) -> Result<()> {
        let mut context = self
            .contexts
            .free(context_id)
            .ok_or(Error::from(VAError::ERROR_INVALID_CONTEXT))?;

        log_err(
            "destroy_context",
            context.device.stream_off(QueueType::Bitstream),
        );
        log_err(
            "destroy_context",
            context.device.stream_off(QueueType::Picture),
        );

        for &id in &context.surfaces {
            let Some(surface) = self.surfaces.get_mut(id) else {
                continue;
            };
            let pending = surface
                .in_flight
                .map_or(false, |in_flight| in_flight.context == context_id);
            if pending || context.current == Some(id) {
                log::warn!("context {context_id:#x} destroyed while surface {id:#x} was pending");
                surface.in_flight = None;
                surface.status = SurfaceStatus::Skipped;
            }
        }

        log::debug!("destroyed context {context_id:#x}");
        Ok(())
    }

    pub fn context(&self, context_id: VAContextID) -> Option<&Context<D>> {
        self.contexts.get(context_id)
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use crate::{pixelformat::PixelFormat, surface::RTFormat, test::*, Entrypoint, Profile};

    use super::*;

    #[test]
    fn create_and_destroy_does_not_leak() {
        for profile in [Profile::MPEG2Simple, Profile::MPEG2Main] {
            for (width, height) in [(16, 16), (720, 576), (1920, 1080)] {
                let (mut driver, _) = test_driver();
                let config = driver.create_config(profile, Entrypoint::VLD).unwrap();
                let surfaces = driver
                    .create_surfaces(width, height, RTFormat::YUV420, 2)
                    .unwrap();
                let before = driver.num_contexts();

                let context = driver
                    .create_context(config, width, height, 0, &surfaces)
                    .unwrap();
                assert_eq!(driver.num_contexts(), before + 1);
                driver.destroy_context(context).unwrap();
                assert_eq!(driver.num_contexts(), before);
            }
        }
    }

    #[test]
    fn device_setup() {
        let (mut driver, state) = test_driver();
        let config = driver
            .create_config(Profile::MPEG2Main, Entrypoint::VLD)
            .unwrap();
        let surfaces = driver
            .create_surfaces(1920, 1080, RTFormat::YUV420, 2)
            .unwrap();
        let context = driver
            .create_context(config, 1920, 1080, 0, &surfaces)
            .unwrap();

        let bitstream = state.borrow().format(QueueType::Bitstream).unwrap();
        assert_eq!(bitstream.pixel_format, PixelFormat::MPEG2_FRAME);
        assert_eq!((bitstream.width, bitstream.height), (1920, 1080));
        assert!(state.borrow().is_streaming(QueueType::Bitstream));
        assert!(state.borrow().is_streaming(QueueType::Picture));

        expect![[r#"
            [
                SetFormat(Bitstream, MG2F 1920x1080, 1 planes),
                AllocateBuffers(Bitstream, 4),
                SetFormat(Picture, ST12 1920x1080, 2 planes),
                AllocateBuffers(Picture, 2),
                StreamOn(Bitstream),
                StreamOn(Picture),
            ]
        "#]]
        .assert_debug_eq(&state.borrow().calls);

        state.borrow_mut().calls.clear();
        driver.destroy_context(context).unwrap();
        assert!(!state.borrow().is_streaming(QueueType::Bitstream));
        assert!(!state.borrow().is_streaming(QueueType::Picture));
        expect![[r#"
            [
                StreamOff(Bitstream),
                StreamOff(Picture),
            ]
        "#]]
        .assert_debug_eq(&state.borrow().calls);
    }

    #[test]
    fn invalid_config_allocates_nothing() {
        let (mut driver, state) = test_driver();
        let surfaces = driver
            .create_surfaces(TEST_WIDTH, TEST_HEIGHT, RTFormat::YUV420, 1)
            .unwrap();
        let err = driver
            .create_context(0xdead, TEST_WIDTH, TEST_HEIGHT, 0, &surfaces)
            .unwrap_err();
        assert_eq!(err.status(), VAError::ERROR_INVALID_CONFIG);
        assert_eq!(driver.num_contexts(), 0);
        assert_eq!(state.borrow().opened, 0);
    }

    #[test]
    fn invalid_surface_rolls_back() {
        let (mut driver, state) = test_driver();
        let config = driver
            .create_config(Profile::MPEG2Main, Entrypoint::VLD)
            .unwrap();
        let mut surfaces = driver
            .create_surfaces(TEST_WIDTH, TEST_HEIGHT, RTFormat::YUV420, 2)
            .unwrap();
        surfaces.push(0x1234);

        let err = driver
            .create_context(config, TEST_WIDTH, TEST_HEIGHT, 0, &surfaces)
            .unwrap_err();
        assert_eq!(err.status(), VAError::ERROR_INVALID_SURFACE);
        assert_eq!(driver.num_contexts(), 0);
        assert_eq!(state.borrow().opened, 0);

        // The reserved handle was released and is handed out again.
        let first = driver
            .create_context(config, TEST_WIDTH, TEST_HEIGHT, 0, &surfaces[..2])
            .unwrap();
        assert_eq!(first, crate::heap::CONTEXT_ID_OFFSET);
    }

    #[test]
    fn context_table_exhaustion() {
        let (mut driver, state) = test_driver_with(DriverOptions::default().max_objects(1));
        let session = test_session(&mut driver, TEST_WIDTH, TEST_HEIGHT, 1);
        state.borrow_mut().calls.clear();

        let err = driver
            .create_context(session.config, TEST_WIDTH, TEST_HEIGHT, 0, &session.surfaces)
            .unwrap_err();
        assert_eq!(err.status(), VAError::ERROR_ALLOCATION_FAILED);
        assert_eq!(driver.num_contexts(), 1);
        assert_eq!(state.borrow().opened, 1);
        assert!(state.borrow().calls.is_empty());

        driver.destroy_context(session.context).unwrap();
        driver
            .create_context(session.config, TEST_WIDTH, TEST_HEIGHT, 0, &session.surfaces)
            .unwrap();
    }

    #[test]
    fn too_many_render_targets() {
        let (mut driver, state) = test_driver();
        let config = driver
            .create_config(Profile::MPEG2Main, Entrypoint::VLD)
            .unwrap();
        let surfaces = driver
            .create_surfaces(TEST_WIDTH, TEST_HEIGHT, RTFormat::YUV420, MAX_RENDER_TARGETS + 1)
            .unwrap();
        let err = driver
            .create_context(config, TEST_WIDTH, TEST_HEIGHT, 0, &surfaces)
            .unwrap_err();
        assert_eq!(err.status(), VAError::ERROR_MAX_NUM_EXCEEDED);
        assert_eq!(driver.num_contexts(), 0);
        assert_eq!(state.borrow().opened, 0);

        driver
            .create_context(config, TEST_WIDTH, TEST_HEIGHT, 0, &surfaces[..MAX_RENDER_TARGETS])
            .unwrap();
    }

    #[test]
    fn oversized_picture() {
        let (mut driver, state) = test_driver();
        let config = driver
            .create_config(Profile::MPEG2Main, Entrypoint::VLD)
            .unwrap();
        let err = driver
            .create_context(config, 0x1_0000, TEST_HEIGHT, 0, &[])
            .unwrap_err();
        assert_eq!(err.status(), VAError::ERROR_RESOLUTION_NOT_SUPPORTED);
        assert_eq!(state.borrow().opened, 0);
    }

    #[test]
    fn unsupported_profile_leaves_device_untouched() {
        let (mut driver, state) = test_driver();
        let config = driver
            .create_config(Profile::H264High, Entrypoint::VLD)
            .unwrap();
        let err = driver
            .create_context(config, TEST_WIDTH, TEST_HEIGHT, 0, &[])
            .unwrap_err();
        assert_eq!(err.status(), VAError::ERROR_UNSUPPORTED_PROFILE);
        assert_eq!(state.borrow().opened, 0);
        assert!(state.borrow().calls.is_empty());
    }

    #[test]
    fn device_setup_failure() -> anyhow::Result<()> {
        for op in [Op::SetFormat, Op::AllocateBuffers, Op::StreamOn] {
            let (mut driver, state) = test_driver();
            let config = driver.create_config(Profile::MPEG2Main, Entrypoint::VLD)?;
            state.borrow_mut().fail(op);

            let err = driver
                .create_context(config, TEST_WIDTH, TEST_HEIGHT, 0, &[])
                .unwrap_err();
            assert_eq!(err.status(), VAError::ERROR_UNKNOWN, "{op:?}");
            assert_eq!(driver.num_contexts(), 0);
        }
        Ok(())
    }

    #[test]
    fn teardown_errors_are_ignored() {
        let (mut driver, state) = test_driver();
        let config = driver
            .create_config(Profile::MPEG2Main, Entrypoint::VLD)
            .unwrap();
        let context = driver
            .create_context(config, TEST_WIDTH, TEST_HEIGHT, 0, &[])
            .unwrap();
        state.borrow_mut().fail(Op::StreamOff);

        driver.destroy_context(context).unwrap();
        assert_eq!(driver.num_contexts(), 0);
        assert_eq!(
            driver.destroy_context(context).unwrap_err().status(),
            VAError::ERROR_INVALID_CONTEXT
        );
    }
}
