//! A VA-API style decode driver for stateless V4L2 memory-to-memory decoders.
//!
//! [`Driver`] implements the decoding half of the VA-API driver interface: clients create
//! [`Config`][config::Config]s, [`Surface`][surface::Surface]s, decode
//! [`Context`][context::Context]s and [`Buffer`][buffer::Buffer]s, and submit pictures with
//! [`Driver::begin_picture`], [`Driver::render_picture`] and [`Driver::end_picture`].
//!
//! Each decode context drives its own instance of a stateless decoder through the [`Device`]
//! trait. With the `v4l2` feature, `v4l2::V4l2Device` talks to the kernel's V4L2 and media request
//! interfaces; submitted pictures rotate through a small fixed ring of device input buffers (see
//! [`slot`]).

#[macro_use]
mod macros;
mod heap;
mod pixelformat;
mod raw;

#[cfg(test)]
mod test;

pub mod buffer;
pub mod codec;
pub mod config;
pub mod context;
pub mod device;
pub mod driver;
pub mod error;
pub mod picture;
pub mod slot;
pub mod surface;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use device::Device;
pub use driver::{Driver, DriverOptions};
pub use error::{Error, VAError, VAStatus};
pub use pixelformat::PixelFormat;
pub use raw::{VABufferID, VAConfigID, VAContextID, VASurfaceID, VA_INVALID_ID};

use std::{ffi::c_int, vec};

type Result<T, E = Error> = std::result::Result<T, E>;

ffi_enum! {
    /// A codec profile, as identified by VA-API.
    pub enum Profile: c_int {
        /// "Misc" profile for format-independent operations.
        None = -1,
        MPEG2Simple = 0,
        MPEG2Main = 1,
        MPEG4Simple = 2,
        MPEG4AdvancedSimple = 3,
        MPEG4Main = 4,
        H264Baseline = 5,
        H264Main = 6,
        H264High = 7,
        VC1Simple = 8,
        VC1Main = 9,
        VC1Advanced = 10,
        H263Baseline = 11,
        JPEGBaseline = 12,
        H264ConstrainedBaseline = 13,
        VP8Version0_3 = 14,
        H264MultiviewHigh = 15,
        H264StereoHigh = 16,
        HEVCMain = 17,
        HEVCMain10 = 18,
        VP9Profile0 = 19,
        VP9Profile1 = 20,
        VP9Profile2 = 21,
        VP9Profile3 = 22,
        HEVCMain12 = 23,
        HEVCMain422_10 = 24,
        HEVCMain422_12 = 25,
        HEVCMain444 = 26,
        HEVCMain444_10 = 27,
        HEVCMain444_12 = 28,
        HEVCSccMain = 29,
        HEVCSccMain10 = 30,
        HEVCSccMain444 = 31,
        AV1Profile0 = 32,
        AV1Profile1 = 33,
        HEVCSccMain444_10 = 34,
        Protected = 35,
    }
}

ffi_enum! {
    /// An entrypoint represents a specific operation on image or video data.
    pub enum Entrypoint: c_int {
        /// Variable-length decoding (of video slices or pictures).
        VLD         = 1,
        IZZ         = 2,
        IDCT        = 3,
        MoComp      = 4,
        Deblocking  = 5,
        /// Video slice encoding.
        EncSlice    = 6,
        /// Picture encoding (eg. for JPEGs)
        EncPicture  = 7,
        EncSliceLP  = 8,
        VideoProc   = 10,
        /// Flexible Encoding Infrastructure
        FEI         = 11,
        Stats       = 12,
        ProtectedTEEComm = 13,
        ProtectedContent = 14,
    }
}

/// A list of [`Profile`]s.
#[derive(Debug, Clone)]
pub struct Profiles {
    pub(crate) vec: Vec<Profile>,
}

impl Profiles {
    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    pub fn contains(&self, profile: Profile) -> bool {
        self.vec.contains(&profile)
    }
}

impl IntoIterator for Profiles {
    type Item = Profile;
    type IntoIter = vec::IntoIter<Profile>;

    fn into_iter(self) -> Self::IntoIter {
        self.vec.into_iter()
    }
}

/// A list of [`Entrypoint`]s.
#[derive(Debug, Clone)]
pub struct Entrypoints {
    pub(crate) vec: Vec<Entrypoint>,
}

impl Entrypoints {
    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    pub fn contains(&self, entrypoint: Entrypoint) -> bool {
        self.vec.contains(&entrypoint)
    }
}

impl IntoIterator for Entrypoints {
    type Item = Entrypoint;
    type IntoIter = vec::IntoIter<Entrypoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.vec.into_iter()
    }
}
