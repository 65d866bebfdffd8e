//! MPEG-2 structures: the client-side VA-API buffer layouts, and the controls the decoder
//! driver expects.

use bytemuck::{Pod, Zeroable};

use super::{VASurfaceID, VA_PADDING_LOW};

/// `VAPictureParameterBufferMPEG2`.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct PictureParameterBuffer {
    pub horizontal_size: u16,
    pub vertical_size: u16,
    pub forward_reference_picture: VASurfaceID,
    pub backward_reference_picture: VASurfaceID,
    pub picture_coding_type: i32,
    /// `f_code[s][t]`, packed as 4 nibbles, `f_code[0][0]` in the most significant one.
    pub f_code: i32,
    pub picture_coding_extension: u32,
    pub va_reserved: [u32; VA_PADDING_LOW],
}

/// `VAIQMatrixBufferMPEG2`.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct IQMatrixBuffer {
    pub load_intra_quantiser_matrix: i32,
    pub load_non_intra_quantiser_matrix: i32,
    pub load_chroma_intra_quantiser_matrix: i32,
    pub load_chroma_non_intra_quantiser_matrix: i32,
    pub intra_quantiser_matrix: [u8; 64],
    pub non_intra_quantiser_matrix: [u8; 64],
    pub chroma_intra_quantiser_matrix: [u8; 64],
    pub chroma_non_intra_quantiser_matrix: [u8; 64],
    pub va_reserved: [u32; VA_PADDING_LOW],
}

pub const MPEG2_TYPE_MPEG2: u32 = 1;

const V4L2_CID_MPEG_BASE: u32 = 0x0099_0900;
pub const V4L2_CID_MPEG_VIDEO_MPEG2_FRAME_HDR: u32 = V4L2_CID_MPEG_BASE + 450;
pub const V4L2_CID_MPEG_VIDEO_MPEG2_QUANTIZATION: u32 = V4L2_CID_MPEG_BASE + 451;

/// Frame header control (`V4L2_CID_MPEG_VIDEO_MPEG2_FRAME_HDR`).
///
/// `slice_len` is in bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct FrameHeader {
    pub slice_len: u32,
    pub slice_pos: u32,
    pub mpeg_type: u32,
    pub width: u16,
    pub height: u16,
    pub picture_coding_type: u32,
    pub f_code: [[u8; 2]; 2],
    pub intra_dc_precision: u8,
    pub picture_structure: u8,
    pub top_field_first: u8,
    pub frame_pred_frame_dct: u8,
    pub concealment_motion_vectors: u8,
    pub q_scale_type: u8,
    pub intra_vlc_format: u8,
    pub alternate_scan: u8,
    pub backward_index: u8,
    pub forward_index: u8,
    pub pad: [u8; 2],
}

/// Quantisation matrix control (`V4L2_CID_MPEG_VIDEO_MPEG2_QUANTIZATION`).
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct Quantization {
    pub load_intra_quantiser_matrix: u8,
    pub load_non_intra_quantiser_matrix: u8,
    pub load_chroma_intra_quantiser_matrix: u8,
    pub load_chroma_non_intra_quantiser_matrix: u8,
    pub intra_quantiser_matrix: [u8; 64],
    pub non_intra_quantiser_matrix: [u8; 64],
    pub chroma_intra_quantiser_matrix: [u8; 64],
    pub chroma_non_intra_quantiser_matrix: [u8; 64],
}
