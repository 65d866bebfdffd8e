//! The driver instance and its options.

use std::{env, path::PathBuf};

use crate::{
    buffer::Buffer,
    config::Config,
    context::Context,
    heap::{ObjectHeap, BUFFER_ID_OFFSET, CONFIG_ID_OFFSET, CONTEXT_ID_OFFSET, SURFACE_ID_OFFSET},
    surface::Surface,
    Device, PixelFormat, Result,
};

/// Largest bitstream buffer whose length in bits still fits the 32-bit fields of the codec
/// controls.
pub const MAX_INPUT_BUFFER_SIZE: u32 = u32::MAX / 8;

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub(crate) input_slots: usize,
    pub(crate) input_buffer_size: u32,
    pub(crate) capture_format: PixelFormat,
    pub(crate) capture_planes: u8,
    pub(crate) max_objects: usize,
    pub(crate) video_device: PathBuf,
    pub(crate) media_device: PathBuf,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            input_slots: 4,
            input_buffer_size: 1024 * 1024,
            capture_format: PixelFormat::SUNXI_TILED_NV12,
            capture_planes: 2,
            max_objects: 4096,
            video_device: PathBuf::from("/dev/video0"),
            media_device: PathBuf::from("/dev/media0"),
        }
    }
}

impl DriverOptions {
    /// Default options, with device paths taken from `REQVA_VIDEO_DEVICE` and
    /// `REQVA_MEDIA_DEVICE` if they are set.
    pub fn from_env() -> Self {
        let mut this = Self::default();
        if let Some(path) = env::var_os("REQVA_VIDEO_DEVICE") {
            this.video_device = path.into();
        }
        if let Some(path) = env::var_os("REQVA_MEDIA_DEVICE") {
            this.media_device = path.into();
        }
        this
    }

    /// Sets the number of bitstream buffers (and thus of pictures in flight) per session.
    ///
    /// # Panics
    ///
    /// Panics if `slots` is zero.
    pub fn input_slots(mut self, slots: usize) -> Self {
        assert!(slots > 0, "at least one input slot is required");
        self.input_slots = slots;
        self
    }

    /// Sets the capacity of each bitstream buffer, which bounds the size of a compressed frame.
    ///
    /// # Panics
    ///
    /// Panics if `size` exceeds [`MAX_INPUT_BUFFER_SIZE`].
    pub fn input_buffer_size(mut self, size: u32) -> Self {
        assert!(
            size <= MAX_INPUT_BUFFER_SIZE,
            "bitstream buffers are limited to {MAX_INPUT_BUFFER_SIZE} bytes"
        );
        self.input_buffer_size = size;
        self
    }

    /// Sets the pixel format and plane count of decoded pictures.
    pub fn capture_format(mut self, format: PixelFormat, planes: u8) -> Self {
        self.capture_format = format;
        self.capture_planes = planes;
        self
    }

    /// Limits the number of objects of each type.
    pub fn max_objects(mut self, max: usize) -> Self {
        self.max_objects = max;
        self
    }

    pub fn video_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.video_device = path.into();
        self
    }

    pub fn media_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.media_device = path.into();
        self
    }
}

type Opener<D> = Box<dyn FnMut(&DriverOptions) -> Result<D>>;

/// A driver instance.
///
/// Owns all client-visible objects and opens one [`Device`] instance per decode context.
///
/// The driver is driven by one thread at a time; the client API serializes calls per context.
pub struct Driver<D: Device> {
    pub(crate) options: DriverOptions,
    pub(crate) open_device: Opener<D>,
    pub(crate) configs: ObjectHeap<Config>,
    pub(crate) contexts: ObjectHeap<Context<D>>,
    pub(crate) surfaces: ObjectHeap<Surface>,
    pub(crate) buffers: ObjectHeap<Buffer>,
}

#[cfg(feature = "v4l2")]
impl Driver<crate::v4l2::V4l2Device> {
    /// Creates a driver for the V4L2 decoder configured in `options`.
    pub fn v4l2(options: DriverOptions) -> Self {
        Self::new(options, |options| {
            crate::v4l2::V4l2Device::open(&options.video_device, &options.media_device)
        })
    }
}

impl<D: Device> Driver<D> {
    /// Creates a driver that uses `open_device` to open a decoder instance for every context.
    pub fn new(
        options: DriverOptions,
        open_device: impl FnMut(&DriverOptions) -> Result<D> + 'static,
    ) -> Self {
        let max = options.max_objects;
        Self {
            options,
            open_device: Box::new(open_device),
            configs: ObjectHeap::new(CONFIG_ID_OFFSET, max),
            contexts: ObjectHeap::new(CONTEXT_ID_OFFSET, max),
            surfaces: ObjectHeap::new(SURFACE_ID_OFFSET, max),
            buffers: ObjectHeap::new(BUFFER_ID_OFFSET, max),
        }
    }

    #[inline]
    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Returns the number of live decode contexts.
    pub fn num_contexts(&self) -> usize {
        self.contexts.len()
    }
}

/// Logs and discards an error on a path that has to continue regardless.
pub(crate) fn log_err(location: &'static str, res: Result<()>) {
    if let Err(e) = res {
        log::error!("ignoring error in {location}: {e}");
    }
}
