//! VC-1 与 MPEG-2 共用的硬件参数块 (小端, 1 字节对齐).
//!
//! - `DXVA_PictureParameters`: 44 字节
//! - `DXVA_SliceInfo`: 22 字节
//! - `DXVA_QmatrixData`: 516 字节

use byteorder::{LittleEndian, WriteBytesExt};
use tao_core::TaoResult;

/// 图像参数块大小
pub const PICTURE_PARAMS_SIZE: usize = 44;
/// 条带信息大小
pub const SLICE_INFO_SIZE: usize = 22;
/// 量化矩阵块大小
pub const QMATRIX_DATA_SIZE: usize = 516;

/// `DXVA_PictureParameters`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PictureParameters {
    pub decoded_picture_index: u16,
    pub deblocked_picture_index: u16,
    pub forward_ref_picture_index: u16,
    pub backward_ref_picture_index: u16,
    pub pic_width_in_mb_minus1: u16,
    pub pic_height_in_mb_minus1: u16,
    pub macroblock_width_minus1: u8,
    pub macroblock_height_minus1: u8,
    pub block_width_minus1: u8,
    pub block_height_minus1: u8,
    pub bpp_minus1: u8,
    pub pic_structure: u8,
    pub second_field: u8,
    pub pic_intra: u8,
    pub pic_backward_prediction: u8,
    pub bidirectional_averaging_mode: u8,
    pub mv_precision_and_chroma_relation: u8,
    pub chroma_format: u8,
    pub pic_scan_fixed: u8,
    pub pic_scan_method: u8,
    pub pic_readback_requests: u8,
    pub rcontrol: u8,
    pub pic_spatial_resid8: u8,
    pub pic_overflow_blocks: u8,
    pub pic_extrapolation: u8,
    pub pic_deblocked: u8,
    pub pic_deblock_confined: u8,
    pub pic_4mv_allowed: u8,
    pub pic_obmc: u8,
    pub pic_bin_pb: u8,
    pub mv_rps: u8,
    pub reserved_bits: u8,
    pub bitstream_fcodes: u16,
    pub bitstream_pce_elements: u16,
    pub bitstream_concealment_need: u8,
    pub bitstream_concealment_method: u8,
}

impl PictureParameters {
    /// 以 16x16 宏块、8x8 块、8 bit、4:2:0 为前提的公共字段
    pub fn macroblock_420(width: u32, height: u32) -> Self {
        Self {
            pic_width_in_mb_minus1: mb_count(width).saturating_sub(1),
            pic_height_in_mb_minus1: mb_count(height).saturating_sub(1),
            macroblock_width_minus1: 15,
            macroblock_height_minus1: 15,
            block_width_minus1: 7,
            block_height_minus1: 7,
            bpp_minus1: 7,
            chroma_format: 1,
            ..Self::default()
        }
    }

    /// 序列化
    pub fn to_bytes(&self) -> TaoResult<Vec<u8>> {
        let mut out = Vec::with_capacity(PICTURE_PARAMS_SIZE);
        for word in [
            self.decoded_picture_index,
            self.deblocked_picture_index,
            self.forward_ref_picture_index,
            self.backward_ref_picture_index,
            self.pic_width_in_mb_minus1,
            self.pic_height_in_mb_minus1,
        ] {
            out.write_u16::<LittleEndian>(word)?;
        }
        for byte in [
            self.macroblock_width_minus1,
            self.macroblock_height_minus1,
            self.block_width_minus1,
            self.block_height_minus1,
            self.bpp_minus1,
            self.pic_structure,
            self.second_field,
            self.pic_intra,
            self.pic_backward_prediction,
            self.bidirectional_averaging_mode,
            self.mv_precision_and_chroma_relation,
            self.chroma_format,
            self.pic_scan_fixed,
            self.pic_scan_method,
            self.pic_readback_requests,
            self.rcontrol,
            self.pic_spatial_resid8,
            self.pic_overflow_blocks,
            self.pic_extrapolation,
            self.pic_deblocked,
            self.pic_deblock_confined,
            self.pic_4mv_allowed,
            self.pic_obmc,
            self.pic_bin_pb,
            self.mv_rps,
            self.reserved_bits,
        ] {
            out.write_u8(byte)?;
        }
        out.write_u16::<LittleEndian>(self.bitstream_fcodes)?;
        out.write_u16::<LittleEndian>(self.bitstream_pce_elements)?;
        out.write_u8(self.bitstream_concealment_need)?;
        out.write_u8(self.bitstream_concealment_method)?;
        Ok(out)
    }
}

/// 像素尺寸对应的宏块数
pub fn mb_count(pixels: u32) -> u16 {
    u16::try_from(pixels.div_ceil(16)).unwrap_or(u16::MAX)
}

/// `DXVA_SliceInfo`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceInfo {
    pub horizontal_position: u16,
    pub vertical_position: u16,
    pub slice_bits_in_buffer: u32,
    pub slice_data_location: u32,
    pub start_code_bit_offset: u8,
    pub mb_bit_offset: u16,
    pub number_mbs_in_slice: u16,
    pub quantizer_scale_code: u16,
}

/// 序列化条带信息数组
pub fn write_slice_infos(slices: &[SliceInfo]) -> TaoResult<Vec<u8>> {
    let mut out = Vec::with_capacity(slices.len() * SLICE_INFO_SIZE);
    for s in slices {
        out.write_u16::<LittleEndian>(s.horizontal_position)?;
        out.write_u16::<LittleEndian>(s.vertical_position)?;
        out.write_u32::<LittleEndian>(s.slice_bits_in_buffer)?;
        out.write_u32::<LittleEndian>(s.slice_data_location)?;
        out.write_u8(s.start_code_bit_offset)?;
        out.write_u8(0)?;
        out.write_u16::<LittleEndian>(s.mb_bit_offset)?;
        out.write_u16::<LittleEndian>(s.number_mbs_in_slice)?;
        out.write_u16::<LittleEndian>(s.quantizer_scale_code)?;
        out.write_u16::<LittleEndian>(0)?;
    }
    Ok(out)
}

/// 序列化 `DXVA_QmatrixData`, 四个矩阵均标记为新矩阵.
///
/// 顺序: 帧内亮度, 帧间亮度, 帧内色度, 帧间色度; 元素按码流 (zigzag) 顺序.
pub fn write_qmatrix_data(matrices: &[[u8; 64]; 4]) -> TaoResult<Vec<u8>> {
    let mut out = Vec::with_capacity(QMATRIX_DATA_SIZE);
    for _ in 0..4 {
        out.write_u8(1)?;
    }
    for matrix in matrices {
        for &coef in matrix {
            out.write_u16::<LittleEndian>(u16::from(coef))?;
        }
    }
    Ok(out)
}
