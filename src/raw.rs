//! Raw ABI types shared with VA-API clients and with the kernel.

pub mod mpeg2;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub const VA_PADDING_LOW: usize = 4;

/// Sentinel used by clients for "no object", eg. a missing reference picture.
pub const VA_INVALID_ID: VAGenericID = 0xffff_ffff;

pub type VAGenericID = u32;
pub type VAConfigID = VAGenericID;
pub type VAContextID = VAGenericID;
pub type VASurfaceID = VAGenericID;
pub type VABufferID = VAGenericID;
