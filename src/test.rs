//! Unit test utilities.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
    fmt,
    rc::Rc,
};

use nix::errno::Errno;

use crate::{
    device::{Control, DequeuedBuffer, Format, QueueBuffer, QueueType},
    driver::{Driver, DriverOptions},
    raw::{VAConfigID, VAContextID, VASurfaceID},
    surface::RTFormat,
    Device, Entrypoint, Error, Profile, Result,
};

pub const TEST_WIDTH: u32 = 16;
pub const TEST_HEIGHT: u32 = 16;

/// A [`MockDevice`] operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    SetFormat,
    AllocateBuffers,
    StreamOn,
    StreamOff,
    QueueBuffer(QueueType),
    DequeueBuffer(QueueType),
    SetControls,
    NewRequest,
    QueueRequest,
    ReinitRequest,
}

impl Op {
    fn name(self) -> &'static str {
        match self {
            Op::SetFormat => "VIDIOC_S_FMT",
            Op::AllocateBuffers => "VIDIOC_REQBUFS",
            Op::StreamOn => "VIDIOC_STREAMON",
            Op::StreamOff => "VIDIOC_STREAMOFF",
            Op::QueueBuffer(_) => "VIDIOC_QBUF",
            Op::DequeueBuffer(_) => "VIDIOC_DQBUF",
            Op::SetControls => "VIDIOC_S_EXT_CTRLS",
            Op::NewRequest => "MEDIA_IOC_REQUEST_ALLOC",
            Op::QueueRequest => "MEDIA_REQUEST_IOC_QUEUE",
            Op::ReinitRequest => "MEDIA_REQUEST_IOC_REINIT",
        }
    }
}

/// A call made to a [`MockDevice`].
#[derive(PartialEq, Eq)]
pub enum Call {
    SetFormat(QueueType, Format),
    AllocateBuffers(QueueType, u32),
    StreamOn(QueueType),
    StreamOff(QueueType),
    QueueBuffer {
        queue: QueueType,
        index: u32,
        num_planes: u8,
        bytes_used: u32,
        request: Option<u32>,
    },
    /// Carries the index of the dequeued buffer.
    DequeueBuffer(QueueType, Option<u32>),
    /// Carries the request and the IDs of the controls.
    SetControls(u32, Vec<u32>),
    NewRequest(u32),
    QueueRequest(u32),
    ReinitRequest(u32),
    /// The device returned an error.
    Failed(Box<Call>),
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::SetFormat(queue, format) => write!(
                f,
                "SetFormat({queue:?}, {} {}x{}, {} planes)",
                format.pixel_format, format.width, format.height, format.num_planes
            ),
            Call::AllocateBuffers(queue, count) => write!(f, "AllocateBuffers({queue:?}, {count})"),
            Call::StreamOn(queue) => write!(f, "StreamOn({queue:?})"),
            Call::StreamOff(queue) => write!(f, "StreamOff({queue:?})"),
            Call::QueueBuffer {
                queue: QueueType::Picture,
                index,
                num_planes,
                ..
            } => write!(f, "QueueBuffer(Picture, {index}, {num_planes} planes)"),
            Call::QueueBuffer {
                queue,
                index,
                bytes_used,
                request,
                ..
            } => {
                write!(f, "QueueBuffer({queue:?}, {index}, {bytes_used} bytes")?;
                if let Some(request) = request {
                    write!(f, ", request {request}")?;
                }
                f.write_str(")")
            }
            Call::DequeueBuffer(queue, index) => {
                write!(f, "DequeueBuffer({queue:?})")?;
                if let Some(index) = index {
                    write!(f, " -> {index}")?;
                }
                Ok(())
            }
            Call::SetControls(request, ids) => {
                write!(f, "SetControls({request}, [")?;
                for (i, id) in ids.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{id:#x}")?;
                }
                f.write_str("])")
            }
            Call::NewRequest(request) => write!(f, "NewRequest({request})"),
            Call::QueueRequest(request) => write!(f, "QueueRequest({request})"),
            Call::ReinitRequest(request) => write!(f, "ReinitRequest({request})"),
            Call::Failed(call) => write!(f, "{call:?} -> error"),
        }
    }
}

/// State shared between a test and the [`MockDevice`]s its driver opens.
#[derive(Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    /// Number of device instances opened.
    pub opened: usize,
    /// Controls set on requests, in order.
    pub controls: Vec<(u32, Vec<Control>)>,
    /// Bitstream payloads of all enqueued bitstream buffers, in order.
    pub bitstream: Vec<Vec<u8>>,
    /// Flag every dequeued buffer as containing a decoding error.
    pub decode_errors: bool,
    formats: HashMap<QueueType, Format>,
    streaming: HashSet<QueueType>,
    queued: HashMap<QueueType, VecDeque<u32>>,
    /// Bitstream buffers attached to requests that have not been queued yet.
    attached: HashMap<u32, Vec<u32>>,
    failing: HashSet<Op>,
}

impl MockState {
    /// Makes every following call of `op` fail.
    pub fn fail(&mut self, op: Op) {
        self.failing.insert(op);
    }

    pub fn clear_failures(&mut self) {
        self.failing.clear();
    }

    pub fn format(&self, queue: QueueType) -> Option<Format> {
        self.formats.get(&queue).copied()
    }

    pub fn is_streaming(&self, queue: QueueType) -> bool {
        self.streaming.contains(&queue)
    }

    /// Indices of the buffers currently queued on `queue`, oldest first.
    pub fn queued(&self, queue: QueueType) -> Vec<u32> {
        self.queued
            .get(&queue)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Indices of the bitstream buffers attached to `request` and waiting for it to be queued.
    pub fn attached(&self, request: u32) -> Vec<u32> {
        self.attached.get(&request).cloned().unwrap_or_default()
    }

    /// Payload size of the last successfully enqueued bitstream buffer.
    pub fn bytes_used(&self) -> Option<u32> {
        self.calls.iter().rev().find_map(|call| match call {
            Call::QueueBuffer {
                queue: QueueType::Bitstream,
                bytes_used,
                ..
            } => Some(*bytes_used),
            _ => None,
        })
    }

    fn record(&mut self, op: Op, call: Call) -> Result<()> {
        if self.failing.contains(&op) {
            self.calls.push(Call::Failed(Box::new(call)));
            return Err(Error::device(op.name(), Errno::EIO));
        }
        self.calls.push(call);
        Ok(())
    }
}

/// An in-memory decoder that completes queued buffers in FIFO order when they are dequeued.
///
/// Buffers enqueued with a request only reach their queue once the request is queued.
pub struct MockDevice {
    state: Rc<RefCell<MockState>>,
    buffers: Vec<Vec<u8>>,
    next_request: u32,
}

impl Device for MockDevice {
    type Request = u32;

    fn set_format(&mut self, queue: QueueType, format: &Format) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Op::SetFormat, Call::SetFormat(queue, *format))?;
        state.formats.insert(queue, *format);
        Ok(())
    }

    fn allocate_buffers(&mut self, queue: QueueType, count: u32) -> Result<u32> {
        let mut state = self.state.borrow_mut();
        state.record(Op::AllocateBuffers, Call::AllocateBuffers(queue, count))?;
        if queue == QueueType::Bitstream {
            let size = state.format(queue).map_or(0, |format| format.size_image) as usize;
            self.buffers = vec![vec![0; size]; count as usize];
        }
        Ok(count)
    }

    fn bitstream_buffer(&mut self, index: usize) -> Option<&mut [u8]> {
        self.buffers.get_mut(index).map(Vec::as_mut_slice)
    }

    fn stream_on(&mut self, queue: QueueType) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Op::StreamOn, Call::StreamOn(queue))?;
        state.streaming.insert(queue);
        Ok(())
    }

    fn stream_off(&mut self, queue: QueueType) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Op::StreamOff, Call::StreamOff(queue))?;
        state.streaming.remove(&queue);
        state.queued.remove(&queue);
        Ok(())
    }

    fn queue_buffer(&mut self, buffer: &QueueBuffer<'_, u32>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(
            Op::QueueBuffer(buffer.queue),
            Call::QueueBuffer {
                queue: buffer.queue,
                index: buffer.index,
                num_planes: buffer.num_planes,
                bytes_used: buffer.bytes_used,
                request: buffer.request.copied(),
            },
        )?;
        if buffer.queue == QueueType::Bitstream {
            let payload = self
                .buffers
                .get(buffer.index as usize)
                .and_then(|data| data.get(..buffer.bytes_used as usize))
                .ok_or(Error::device("VIDIOC_QBUF", Errno::EINVAL))?;
            state.bitstream.push(payload.to_vec());
        }
        match buffer.request {
            Some(&request) => state.attached.entry(request).or_default().push(buffer.index),
            None => state
                .queued
                .entry(buffer.queue)
                .or_default()
                .push_back(buffer.index),
        }
        Ok(())
    }

    fn dequeue_buffer(&mut self, queue: QueueType) -> Result<DequeuedBuffer> {
        let mut state = self.state.borrow_mut();
        let index = state.queued.get_mut(&queue).and_then(VecDeque::pop_front);
        let Some(index) = index else {
            state
                .calls
                .push(Call::Failed(Box::new(Call::DequeueBuffer(queue, None))));
            return Err(Error::device("VIDIOC_DQBUF", Errno::EAGAIN));
        };
        state.record(Op::DequeueBuffer(queue), Call::DequeueBuffer(queue, Some(index)))?;
        Ok(DequeuedBuffer {
            index,
            error: state.decode_errors,
        })
    }

    fn set_controls(&mut self, request: &u32, controls: &[Control]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let ids = controls.iter().map(|control| control.id).collect();
        state.record(Op::SetControls, Call::SetControls(*request, ids))?;
        state.controls.push((*request, controls.to_vec()));
        Ok(())
    }

    fn new_request(&mut self) -> Result<u32> {
        let request = self.next_request;
        self.state
            .borrow_mut()
            .record(Op::NewRequest, Call::NewRequest(request))?;
        self.next_request += 1;
        Ok(request)
    }

    fn queue_request(&mut self, request: &u32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Op::QueueRequest, Call::QueueRequest(*request))?;
        let attached = state.attached.remove(request).unwrap_or_default();
        state
            .queued
            .entry(QueueType::Bitstream)
            .or_default()
            .extend(attached);
        Ok(())
    }

    fn reinit_request(&mut self, request: &u32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.record(Op::ReinitRequest, Call::ReinitRequest(*request))?;
        state.attached.remove(request);
        Ok(())
    }
}

pub fn test_driver() -> (Driver<MockDevice>, Rc<RefCell<MockState>>) {
    test_driver_with(DriverOptions::default())
}

/// Creates a [`Driver`] whose devices are [`MockDevice`]s sharing the returned state.
pub fn test_driver_with(options: DriverOptions) -> (Driver<MockDevice>, Rc<RefCell<MockState>>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let state = Rc::new(RefCell::new(MockState::default()));
    let shared = state.clone();
    let driver = Driver::new(options, move |_| {
        shared.borrow_mut().opened += 1;
        Ok(MockDevice {
            state: shared.clone(),
            buffers: Vec::new(),
            next_request: 0,
        })
    });
    (driver, state)
}

/// A decode session with its configuration and render targets.
pub struct Session {
    pub config: VAConfigID,
    pub context: VAContextID,
    pub surfaces: Vec<VASurfaceID>,
}

/// Creates an MPEG-2 decode session with `num_surfaces` render targets.
pub fn test_session(
    driver: &mut Driver<MockDevice>,
    width: u32,
    height: u32,
    num_surfaces: usize,
) -> Session {
    let config = driver
        .create_config(Profile::MPEG2Main, Entrypoint::VLD)
        .expect("failed to create config");
    let surfaces = driver
        .create_surfaces(width, height, RTFormat::YUV420, num_surfaces)
        .expect("failed to create surfaces");
    let context = driver
        .create_context(config, width, height, 0, &surfaces)
        .expect("failed to create context");
    Session {
        config,
        context,
        surfaces,
    }
}
