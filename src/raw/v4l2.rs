//! Kernel interfaces `v4l2r` does not wrap: enqueueing a buffer into a media request, and the
//! request ioctls of the media controller.

use std::ffi::c_int;

use v4l2r::bindings::v4l2_buffer;

nix::ioctl_readwrite!(vidioc_qbuf, b'V', 15, v4l2_buffer);

nix::ioctl_read!(media_ioc_request_alloc, b'|', 0x05, c_int);
nix::ioctl_none!(media_request_ioc_queue, b'|', 0x80);
nix::ioctl_none!(media_request_ioc_reinit, b'|', 0x81);
