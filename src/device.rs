//! The device queue protocol the decode pipeline is built on.
//!
//! A [`Device`] is one instance of a stateless memory-to-memory decoder: a compressed
//! bitstream queue feeding a decoded picture queue, both multi-planar and backed by
//! memory-mapped buffers. Work is submitted in transactions ("requests") that tie one buffer of
//! each queue and the codec controls for the frame together.

use crate::{PixelFormat, Result};

/// The two queues of a decoder instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    /// Compressed bitstream input (`V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE`).
    Bitstream,
    /// Decoded picture output (`V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE`).
    Picture,
}

/// Format of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub num_planes: u8,
    /// Size of the first plane of each buffer, or 0 to let the device choose.
    pub size_image: u32,
}

/// An extended control to attach to a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub id: u32,
    pub payload: Vec<u8>,
}

/// A buffer to enqueue.
#[derive(Debug)]
pub struct QueueBuffer<'a, R> {
    pub queue: QueueType,
    pub index: u32,
    pub num_planes: u8,
    /// Bytes of payload in the first plane (bitstream buffers only).
    pub bytes_used: u32,
    /// The transaction the buffer belongs to.
    pub request: Option<&'a R>,
}

/// A buffer returned by [`Device::dequeue_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DequeuedBuffer {
    pub index: u32,
    /// The device flagged the buffer as containing a decoding error.
    pub error: bool,
}

/// A stateless decoder device instance.
///
/// The device is owned by a single decode session and is only ever driven from one thread.
pub trait Device {
    /// Transaction handle type.
    type Request;

    fn set_format(&mut self, queue: QueueType, format: &Format) -> Result<()>;

    /// Allocates `count` memory-mapped buffers on `queue`, and returns how many were allocated.
    fn allocate_buffers(&mut self, queue: QueueType, count: u32) -> Result<u32>;

    /// Returns the CPU mapping of a bitstream buffer.
    fn bitstream_buffer(&mut self, index: usize) -> Option<&mut [u8]>;

    fn stream_on(&mut self, queue: QueueType) -> Result<()>;

    fn stream_off(&mut self, queue: QueueType) -> Result<()>;

    fn queue_buffer(&mut self, buffer: &QueueBuffer<'_, Self::Request>) -> Result<()>;

    /// Waits for the oldest buffer queued on `queue` to be completed and returns it.
    fn dequeue_buffer(&mut self, queue: QueueType) -> Result<DequeuedBuffer>;

    /// Stores `controls` in `request`, to be applied when the request is processed.
    fn set_controls(&mut self, request: &Self::Request, controls: &[Control]) -> Result<()>;

    /// Creates a new transaction handle.
    fn new_request(&mut self) -> Result<Self::Request>;

    /// Submits a transaction after its buffers were enqueued.
    fn queue_request(&mut self, request: &Self::Request) -> Result<()>;

    /// Returns a completed transaction handle to its initial state so it can be reused.
    fn reinit_request(&mut self, request: &Self::Request) -> Result<()>;
}
