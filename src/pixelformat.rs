use std::fmt;

/// A FourCC code identifying a device pixel format.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PixelFormat(u32);

impl PixelFormat {
    /// Whole MPEG-2 frames, parsed by the client, with a frame header control per frame.
    pub const MPEG2_FRAME: Self = f(b"MG2F");

    /// MPEG-2 slices, with per-picture stateless controls.
    pub const MPEG2_SLICE: Self = f(b"MG2S");

    /// Planar YUV 4:2:0, luma plane followed by an interleaved chroma plane.
    pub const NV12: Self = f(b"NV12");

    /// Like [`PixelFormat::NV12`], but with the luma and chroma planes in separate buffers.
    pub const NV12M: Self = f(b"NM12");

    /// Allwinner's tiled NV12 layout, as produced by the Cedrus video engine.
    ///
    /// Luma and chroma are stored in separate planes of 32x32 tiles.
    pub const SUNXI_TILED_NV12: Self = f(b"ST12");

    pub const fn from_bytes(fourcc: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(fourcc))
    }

    pub const fn from_u32_le(fourcc: u32) -> Self {
        Self(fourcc)
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub const fn to_u32_le(self) -> u32 {
        self.0
    }
}

const fn f(fourcc: &[u8; 4]) -> PixelFormat {
    PixelFormat::from_bytes(*fourcc)
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_le_bytes();
        let [a, b, c, d] = bytes.map(|b| (b as char).escape_default());
        write!(f, "{}{}{}{}", a, b, c, d)
    }
}

impl fmt::Debug for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}
