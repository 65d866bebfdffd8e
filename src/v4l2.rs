//! [`Device`] implementation for V4L2 stateless decoders using the media request API.
//!
//! Formats, buffer allocation, streaming, dequeueing and controls go through [`v4l2r`]. Buffers
//! bound to a media request and the request ioctls themselves are issued directly.

use std::{
    ffi::c_int,
    fs::{File, OpenOptions},
    mem,
    num::NonZeroUsize,
    os::fd::{AsRawFd, FromRawFd, OwnedFd},
    path::Path,
    ptr::NonNull,
    slice,
};

use nix::{
    errno::Errno,
    sys::mman::{mmap, munmap, MapFlags, ProtFlags},
};
use v4l2r::{
    bindings,
    ioctl::{self, BufferFlags, CtrlWhich, V4l2Buffer, V4l2MplaneFormat, V4l2PlanesWithBacking},
    memory::MemoryType,
};

use crate::{
    device::{Control, DequeuedBuffer, Device, Format, QueueBuffer, QueueType},
    error::Error,
    raw::v4l2::{
        media_ioc_request_alloc, media_request_ioc_queue, media_request_ioc_reinit, vidioc_qbuf,
    },
    Result,
};

impl QueueType {
    fn v4l2(self) -> v4l2r::QueueType {
        match self {
            QueueType::Bitstream => v4l2r::QueueType::VideoOutputMplane,
            QueueType::Picture => v4l2r::QueueType::VideoCaptureMplane,
        }
    }
}

type PlanesFmt = [bindings::v4l2_plane_pix_format; bindings::VIDEO_MAX_PLANES as usize];

/// A memory-mapped bitstream buffer.
struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = munmap(self.ptr.cast(), self.len) {
                log::error!("ignoring error in destructor: munmap: {e}");
            }
        }
    }
}

/// A V4L2 memory-to-memory decoder instance.
///
/// Each [`V4l2Device`] has its own file description of the video node, and thus its own pair of
/// queues.
pub struct V4l2Device {
    // Dropped before `video`, so the buffers are unmapped before the queues are released.
    mappings: Vec<Mapping>,
    video: File,
    media: File,
}

impl V4l2Device {
    /// Opens a decoder instance on the `video` node, allocating requests on the `media` node.
    pub fn open(video: impl AsRef<Path>, media: impl AsRef<Path>) -> Result<Self> {
        let (video, media) = (video.as_ref(), media.as_ref());
        let open = |path: &Path| {
            OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(Error::from)
        };
        let this = Self {
            mappings: Vec::new(),
            video: open(video)?,
            media: open(media)?,
        };
        log::debug!(
            "opened decoder instance on {} (media device {})",
            video.display(),
            media.display(),
        );
        Ok(this)
    }

    fn map_bitstream_buffers(&mut self, count: u32) -> Result<()> {
        self.mappings.clear();
        for index in 0..count {
            let buffer: V4l2Buffer =
                ioctl::querybuf(&self.video, QueueType::Bitstream.v4l2(), index as usize)
                    .map_err(|e| Error::backend("VIDIOC_QUERYBUF", e))?;
            let len = *buffer.get_first_plane().length as usize;
            let offset = match buffer.planes_with_backing_iter() {
                V4l2PlanesWithBacking::Mmap(mut planes) => planes.next().map(|p| p.mem_offset()),
                _ => None,
            };
            let (Some(length), Some(offset)) = (NonZeroUsize::new(len), offset) else {
                return Err(Error::device("VIDIOC_QUERYBUF", Errno::EINVAL));
            };
            let ptr = unsafe {
                mmap(
                    None,
                    length,
                    ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                    MapFlags::MAP_SHARED,
                    &self.video,
                    offset as nix::libc::off_t,
                )
                .map_err(|e| Error::device("mmap", e))?
            };
            self.mappings.push(Mapping {
                ptr: ptr.cast(),
                len,
            });
        }
        Ok(())
    }
}

impl Device for V4l2Device {
    type Request = OwnedFd;

    fn set_format(&mut self, queue: QueueType, format: &Format) -> Result<()> {
        let mut plane_fmt: PlanesFmt = Default::default();
        plane_fmt[0].sizeimage = format.size_image;
        let pix_mp = bindings::v4l2_pix_format_mplane {
            width: format.width,
            height: format.height,
            pixelformat: format.pixel_format.to_u32_le(),
            field: bindings::v4l2_field_V4L2_FIELD_ANY,
            plane_fmt,
            num_planes: format.num_planes,
            ..Default::default()
        };
        let format = V4l2MplaneFormat::from((queue.v4l2().direction(), pix_mp));
        let v4l2_format: &bindings::v4l2_format = format.as_ref();
        let _: bindings::v4l2_format = ioctl::s_fmt(&mut self.video, *v4l2_format)
            .map_err(|e| Error::backend("VIDIOC_S_FMT", e))?;
        Ok(())
    }

    fn allocate_buffers(&mut self, queue: QueueType, count: u32) -> Result<u32> {
        let reqbufs: bindings::v4l2_requestbuffers =
            ioctl::reqbufs(&self.video, queue.v4l2(), MemoryType::Mmap, count)
                .map_err(|e| Error::backend("VIDIOC_REQBUFS", e))?;
        if queue == QueueType::Bitstream {
            self.map_bitstream_buffers(reqbufs.count)?;
        }
        Ok(reqbufs.count)
    }

    fn bitstream_buffer(&mut self, index: usize) -> Option<&mut [u8]> {
        let mapping = self.mappings.get_mut(index)?;
        unsafe { Some(slice::from_raw_parts_mut(mapping.ptr.as_ptr(), mapping.len)) }
    }

    fn stream_on(&mut self, queue: QueueType) -> Result<()> {
        ioctl::streamon(&self.video, queue.v4l2())
            .map_err(|e| Error::backend("VIDIOC_STREAMON", e))
    }

    fn stream_off(&mut self, queue: QueueType) -> Result<()> {
        ioctl::streamoff(&self.video, queue.v4l2())
            .map_err(|e| Error::backend("VIDIOC_STREAMOFF", e))
    }

    fn queue_buffer(&mut self, buffer: &QueueBuffer<'_, OwnedFd>) -> Result<()> {
        // `v4l2r` has no way to attach a buffer to a request, so this one is built by hand.
        unsafe {
            let mut planes: [bindings::v4l2_plane; bindings::VIDEO_MAX_PLANES as usize] =
                mem::zeroed();
            planes[0].bytesused = buffer.bytes_used;

            let mut buf: bindings::v4l2_buffer = mem::zeroed();
            buf.index = buffer.index;
            buf.type_ = buffer.queue.v4l2() as u32;
            buf.memory = MemoryType::Mmap as u32;
            buf.length = buffer.num_planes.into();
            buf.m.planes = planes.as_mut_ptr();
            if let Some(request) = buffer.request {
                buf.flags |= bindings::V4L2_BUF_FLAG_REQUEST_FD;
                buf.__bindgen_anon_1.request_fd = request.as_raw_fd();
            }
            vidioc_qbuf(self.video.as_raw_fd(), &mut buf)
                .map_err(|e| Error::device("VIDIOC_QBUF", e))?;
        }
        Ok(())
    }

    fn dequeue_buffer(&mut self, queue: QueueType) -> Result<DequeuedBuffer> {
        let buffer: V4l2Buffer = ioctl::dqbuf(&self.video, queue.v4l2())
            .map_err(|e| Error::backend("VIDIOC_DQBUF", e))?;
        Ok(DequeuedBuffer {
            index: buffer.index() as u32,
            error: buffer.flags().contains(BufferFlags::ERROR),
        })
    }

    fn set_controls(&mut self, request: &OwnedFd, controls: &[Control]) -> Result<()> {
        // The kernel only reads through the payload pointers, but the ABI wants them mutable.
        let mut raw: Vec<bindings::v4l2_ext_control> = controls
            .iter()
            .map(|control| {
                let mut raw: bindings::v4l2_ext_control = unsafe { mem::zeroed() };
                raw.id = control.id;
                raw.size = control.payload.len() as u32;
                raw.__bindgen_anon_1.ptr = control.payload.as_ptr() as *mut _;
                raw
            })
            .collect();
        ioctl::s_ext_ctrls(
            &self.video,
            CtrlWhich::Request(request.as_raw_fd()),
            &mut raw.as_mut_slice(),
        )
        .map_err(|e| Error::backend("VIDIOC_S_EXT_CTRLS", e))
    }

    fn new_request(&mut self) -> Result<OwnedFd> {
        let mut fd: c_int = -1;
        unsafe {
            media_ioc_request_alloc(self.media.as_raw_fd(), &mut fd)
                .map_err(|e| Error::device("MEDIA_IOC_REQUEST_ALLOC", e))?;
            Ok(OwnedFd::from_raw_fd(fd))
        }
    }

    fn queue_request(&mut self, request: &OwnedFd) -> Result<()> {
        unsafe {
            media_request_ioc_queue(request.as_raw_fd())
                .map_err(|e| Error::device("MEDIA_REQUEST_IOC_QUEUE", e))?;
        }
        Ok(())
    }

    fn reinit_request(&mut self, request: &OwnedFd) -> Result<()> {
        unsafe {
            media_request_ioc_reinit(request.as_raw_fd())
                .map_err(|e| Error::device("MEDIA_REQUEST_IOC_REINIT", e))?;
        }
        Ok(())
    }
}
