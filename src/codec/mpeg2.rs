//! MPEG-2 support.

use bytemuck::Zeroable;

pub use crate::raw::mpeg2::{IQMatrixBuffer, PictureParameterBuffer};

use crate::{
    buffer::BufferType,
    device::Control,
    raw::mpeg2::{
        FrameHeader, Quantization, MPEG2_TYPE_MPEG2, V4L2_CID_MPEG_VIDEO_MPEG2_FRAME_HDR,
        V4L2_CID_MPEG_VIDEO_MPEG2_QUANTIZATION,
    },
    Error, PixelFormat, Result, VAError,
};

use super::{read_param, CodecHandler, References};

/// Accessors for the packed `picture_coding_extension` bitfield.
#[derive(Clone, Copy)]
struct PictureCodingExtension(u32);

impl PictureCodingExtension {
    fn bits(self, shift: u32, width: u32) -> u8 {
        ((self.0 >> shift) & ((1 << width) - 1)) as u8
    }

    fn intra_dc_precision(self) -> u8 {
        self.bits(0, 2)
    }

    fn picture_structure(self) -> u8 {
        self.bits(2, 2)
    }

    fn top_field_first(self) -> u8 {
        self.bits(4, 1)
    }

    fn frame_pred_frame_dct(self) -> u8 {
        self.bits(5, 1)
    }

    fn concealment_motion_vectors(self) -> u8 {
        self.bits(6, 1)
    }

    fn q_scale_type(self) -> u8 {
        self.bits(7, 1)
    }

    fn intra_vlc_format(self) -> u8 {
        self.bits(8, 1)
    }

    fn alternate_scan(self) -> u8 {
        self.bits(9, 1)
    }
}

/// Unpacks VA-API's `f_code` nibbles into `f_code[s][t]`.
fn unpack_f_code(f_code: i32) -> [[u8; 2]; 2] {
    let nibble = |shift: u32| ((f_code >> shift) & 0xf) as u8;
    [[nibble(12), nibble(8)], [nibble(4), nibble(0)]]
}

/// Contexts have at most [`MAX_RENDER_TARGETS`](crate::context::MAX_RENDER_TARGETS) picture
/// buffers, so their indices fit a byte.
fn buffer_index(index: u32) -> u8 {
    u8::try_from(index).unwrap_or(u8::MAX)
}

/// Stages one MPEG-2 frame header (and optionally its quantisation matrices) per picture.
pub struct Mpeg2Handler {
    width: u16,
    height: u16,
    header: FrameHeader,
    quantization: Option<Quantization>,
}

impl Mpeg2Handler {
    /// Fails with [`VAError::ERROR_RESOLUTION_NOT_SUPPORTED`] if a dimension does not fit the
    /// 16-bit fields of the frame header.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let (Ok(width), Ok(height)) = (u16::try_from(width), u16::try_from(height)) else {
            log::debug!("{width}x{height} exceeds the MPEG-2 frame header");
            return Err(Error::from(VAError::ERROR_RESOLUTION_NOT_SUPPORTED));
        };
        let mut this = Self {
            width,
            height,
            header: FrameHeader::default(),
            quantization: None,
        };
        this.begin_frame();
        Ok(this)
    }

    fn apply_picture_parameters(&mut self, params: &PictureParameterBuffer, refs: &References<'_>) {
        let ext = PictureCodingExtension(params.picture_coding_extension);
        let hdr = &mut self.header;
        hdr.width = params.horizontal_size;
        hdr.height = params.vertical_size;
        hdr.picture_coding_type = params.picture_coding_type as u32;
        hdr.f_code = unpack_f_code(params.f_code);
        hdr.intra_dc_precision = ext.intra_dc_precision();
        hdr.picture_structure = ext.picture_structure();
        hdr.top_field_first = ext.top_field_first();
        hdr.frame_pred_frame_dct = ext.frame_pred_frame_dct();
        hdr.concealment_motion_vectors = ext.concealment_motion_vectors();
        hdr.q_scale_type = ext.q_scale_type();
        hdr.intra_vlc_format = ext.intra_vlc_format();
        hdr.alternate_scan = ext.alternate_scan();
        hdr.forward_index = buffer_index(refs.index_of(params.forward_reference_picture));
        hdr.backward_index = buffer_index(refs.index_of(params.backward_reference_picture));
    }

    fn apply_iq_matrix(&mut self, iq: &IQMatrixBuffer) {
        self.quantization = Some(Quantization {
            load_intra_quantiser_matrix: (iq.load_intra_quantiser_matrix != 0).into(),
            load_non_intra_quantiser_matrix: (iq.load_non_intra_quantiser_matrix != 0).into(),
            load_chroma_intra_quantiser_matrix: (iq.load_chroma_intra_quantiser_matrix != 0)
                .into(),
            load_chroma_non_intra_quantiser_matrix: (iq.load_chroma_non_intra_quantiser_matrix
                != 0)
                .into(),
            intra_quantiser_matrix: iq.intra_quantiser_matrix,
            non_intra_quantiser_matrix: iq.non_intra_quantiser_matrix,
            chroma_intra_quantiser_matrix: iq.chroma_intra_quantiser_matrix,
            chroma_non_intra_quantiser_matrix: iq.chroma_non_intra_quantiser_matrix,
        });
    }

    /// Returns the currently staged frame header.
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }
}

impl CodecHandler for Mpeg2Handler {
    fn device_format(&self) -> PixelFormat {
        PixelFormat::MPEG2_FRAME
    }

    fn begin_frame(&mut self) {
        self.header = FrameHeader {
            mpeg_type: MPEG2_TYPE_MPEG2,
            width: self.width,
            height: self.height,
            ..FrameHeader::zeroed()
        };
        self.quantization = None;
    }

    fn apply_parameters(
        &mut self,
        ty: BufferType,
        data: &[u8],
        refs: &References<'_>,
    ) -> Result<bool> {
        match ty {
            BufferType::PictureParameter => {
                self.apply_picture_parameters(&read_param(data)?, refs);
                Ok(true)
            }
            BufferType::IQMatrix => {
                self.apply_iq_matrix(&read_param(data)?);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn encode_control_structure(&self, bitstream_len: usize) -> Vec<Control> {
        let header = FrameHeader {
            slice_pos: 0,
            slice_len: u32::try_from(bitstream_len * 8).unwrap_or(u32::MAX),
            ..self.header
        };

        let mut controls = vec![Control {
            id: V4L2_CID_MPEG_VIDEO_MPEG2_FRAME_HDR,
            payload: bytemuck::bytes_of(&header).to_vec(),
        }];
        if let Some(quantization) = &self.quantization {
            controls.push(Control {
                id: V4L2_CID_MPEG_VIDEO_MPEG2_QUANTIZATION,
                payload: bytemuck::bytes_of(quantization).to_vec(),
            });
        }
        controls
    }
}
