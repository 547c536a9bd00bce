//! H.264 硬件参数块布局 (小端, 1 字节对齐).
//!
//! - `DXVA_PicParams_H264`: 1040 字节
//! - `DXVA_Slice_H264_Short`: 10 字节
//! - `DXVA_Slice_H264_Long`: 864 字节
//! - `DXVA_Qmatrix_H264`: 224 字节

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use tao_core::TaoResult;

use super::bitstream::SliceLocation;
use super::picture::{H264Picture, H264Slice};
use super::refs::RefTable;
use crate::sample::FieldType;
use crate::surface::SurfaceIndex;

/// 图像参数块大小
pub const PIC_PARAMS_SIZE: usize = 1040;
/// 短格式条带控制大小
pub const SLICE_SHORT_SIZE: usize = 10;
/// 长格式条带控制大小
pub const SLICE_LONG_SIZE: usize = 864;
/// 量化矩阵大小
pub const QMATRIX_SIZE: usize = 224;

/// 无效图像条目
const INVALID_ENTRY: u8 = 0xFF;
const SLICE_GROUP_MAP_SIZE: usize = 810;
const REF_LIST_SIZE: usize = 32;

fn pic_entry(index: u8, associated: bool) -> u8 {
    (index & 0x7F) | (u8::from(associated) << 7)
}

/// 构建 `DXVA_PicParams_H264`
pub fn write_pic_params(
    pic: &H264Picture,
    curr: SurfaceIndex,
    refs: &RefTable,
    status_report: u32,
) -> TaoResult<Vec<u8>> {
    let p = &pic.params;
    let field_pic = pic.field_type.is_field();
    let mbaff = p.mb_adaptive_frame_field && !field_pic;
    let mut out = Vec::with_capacity(PIC_PARAMS_SIZE);

    out.write_u16::<LittleEndian>(p.width_mbs.saturating_sub(1))?;
    out.write_u16::<LittleEndian>(p.height_mbs.saturating_sub(1))?;
    out.write_u8(pic_entry(
        curr.index7(),
        pic.field_type == FieldType::BottomField,
    ))?;
    out.write_u8(p.num_ref_frames)?;

    let mut bits: u16 = u16::from(field_pic);
    bits |= u16::from(mbaff) << 1;
    bits |= u16::from(p.residual_colour_transform) << 2;
    bits |= u16::from(pic.sp_for_switch) << 3;
    bits |= u16::from(p.chroma_format_idc & 0x03) << 4;
    bits |= u16::from(pic.is_reference()) << 6;
    bits |= u16::from(p.constrained_intra_pred) << 7;
    bits |= u16::from(p.weighted_pred) << 8;
    bits |= u16::from(p.weighted_bipred_idc & 0x03) << 9;
    // MbsConsecutiveFlag
    bits |= 1 << 11;
    bits |= u16::from(p.frame_mbs_only) << 12;
    bits |= u16::from(p.transform_8x8_mode) << 13;
    bits |= u16::from(p.min_luma_bipred_8x8) << 14;
    bits |= u16::from(pic.intra_pic) << 15;
    out.write_u16::<LittleEndian>(bits)?;

    out.write_u8(p.bit_depth_luma_minus8)?;
    out.write_u8(p.bit_depth_chroma_minus8)?;
    // Reserved16Bits
    out.write_u16::<LittleEndian>(3)?;
    out.write_u32::<LittleEndian>(status_report)?;

    for entry in refs.entries() {
        let value = match entry {
            Some(r) => pic_entry(r.surface.index7(), r.long_term),
            None => INVALID_ENTRY,
        };
        out.write_u8(value)?;
    }

    let (curr_top, curr_bottom) = match pic.field_type {
        FieldType::Frame => (pic.top_poc, pic.bottom_poc),
        FieldType::TopField => (pic.top_poc, 0),
        FieldType::BottomField => (0, pic.bottom_poc),
    };
    out.write_i32::<LittleEndian>(curr_top)?;
    out.write_i32::<LittleEndian>(curr_bottom)?;
    for entry in refs.entries() {
        let (top, bottom) = entry.map(|r| (r.top_poc, r.bottom_poc)).unwrap_or((0, 0));
        out.write_i32::<LittleEndian>(top)?;
        out.write_i32::<LittleEndian>(bottom)?;
    }

    out.write_i8(p.pic_init_qs_minus26)?;
    out.write_i8(p.chroma_qp_index_offset)?;
    out.write_i8(p.second_chroma_qp_index_offset)?;
    // ContinuationFlag
    out.write_u8(1)?;
    out.write_i8(p.pic_init_qp_minus26)?;
    out.write_u8(p.num_ref_idx_l0_default_minus1)?;
    out.write_u8(p.num_ref_idx_l1_default_minus1)?;
    out.write_u8(0)?;

    let mut used_flags: u32 = 0;
    for (i, entry) in refs.entries().iter().enumerate() {
        let num = match entry {
            Some(r) => {
                used_flags |= u32::from(r.top_ref) << (2 * i);
                used_flags |= u32::from(r.bottom_ref) << (2 * i + 1);
                if r.long_term {
                    r.long_term_frame_idx as u16
                } else {
                    r.frame_num
                }
            }
            None => 0,
        };
        out.write_u16::<LittleEndian>(num)?;
    }
    out.write_u32::<LittleEndian>(used_flags)?;
    // NonExistingFrameFlags
    out.write_u16::<LittleEndian>(0)?;
    out.write_u16::<LittleEndian>(pic.frame_num)?;

    out.write_u8(p.log2_max_frame_num_minus4)?;
    out.write_u8(p.pic_order_cnt_type)?;
    out.write_u8(p.log2_max_poc_lsb_minus4)?;
    out.write_u8(u8::from(p.delta_pic_order_always_zero))?;
    out.write_u8(u8::from(p.direct_8x8_inference))?;
    out.write_u8(u8::from(p.entropy_coding_mode))?;
    out.write_u8(u8::from(p.pic_order_present))?;
    out.write_u8(p.num_slice_groups_minus1)?;
    out.write_u8(p.slice_group_map_type)?;
    out.write_u8(u8::from(p.deblocking_filter_control_present))?;
    out.write_u8(u8::from(p.redundant_pic_cnt_present))?;
    out.write_u8(0)?;
    out.write_u16::<LittleEndian>(p.slice_group_change_rate_minus1)?;
    out.write_all(&[0u8; SLICE_GROUP_MAP_SIZE])?;

    debug_assert_eq!(out.len(), PIC_PARAMS_SIZE);
    Ok(out)
}

/// 构建短格式条带控制数组
pub fn write_short_slices(slices: &[SliceLocation]) -> TaoResult<Vec<u8>> {
    let mut out = Vec::with_capacity(slices.len() * SLICE_SHORT_SIZE);
    for slice in slices {
        out.write_u32::<LittleEndian>(slice.offset as u32)?;
        out.write_u32::<LittleEndian>(slice.size as u32)?;
        // wBadSliceChopping
        out.write_u16::<LittleEndian>(0)?;
    }
    Ok(out)
}

/// 构建长格式条带控制数组, 条带参考列表映射到参考帧表位置
pub fn write_long_slices(
    locations: &[SliceLocation],
    headers: &[H264Slice],
    refs: &RefTable,
) -> TaoResult<Vec<u8>> {
    let mut out = Vec::with_capacity(locations.len() * SLICE_LONG_SIZE);
    let fallback = H264Slice::default();
    for (i, loc) in locations.iter().enumerate() {
        let h = headers.get(i).unwrap_or(&fallback);
        out.write_u32::<LittleEndian>(loc.offset as u32)?;
        out.write_u32::<LittleEndian>(loc.size as u32)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(h.first_mb_in_slice)?;
        out.write_u16::<LittleEndian>(h.num_mbs_for_slice)?;
        out.write_u16::<LittleEndian>(h.bit_offset_to_slice_data)?;
        out.write_u8(h.slice_type)?;
        out.write_u8(h.luma_log2_weight_denom)?;
        out.write_u8(h.chroma_log2_weight_denom)?;
        out.write_u8(h.num_ref_idx_l0_active_minus1)?;
        out.write_u8(h.num_ref_idx_l1_active_minus1)?;
        out.write_i8(h.slice_alpha_c0_offset_div2)?;
        out.write_i8(h.slice_beta_offset_div2)?;
        out.write_u8(0)?;

        for list in &h.ref_pic_list {
            for k in 0..REF_LIST_SIZE {
                let value = list
                    .get(k)
                    .and_then(|entry| {
                        refs.position_of(entry)
                            .map(|pos| pic_entry(pos as u8, entry.bottom_field))
                    })
                    .unwrap_or(INVALID_ENTRY);
                out.write_u8(value)?;
            }
        }

        for list in &h.weights {
            for k in 0..REF_LIST_SIZE {
                let table = list.get(k).copied().unwrap_or([[0; 2]; 3]);
                for component in table {
                    out.write_i16::<LittleEndian>(component[0])?;
                    out.write_i16::<LittleEndian>(component[1])?;
                }
            }
        }

        out.write_i8(h.slice_qs_delta)?;
        out.write_i8(h.slice_qp_delta)?;
        out.write_u8(h.redundant_pic_cnt)?;
        out.write_u8(u8::from(h.direct_spatial_mv_pred))?;
        out.write_u8(h.cabac_init_idc)?;
        out.write_u8(h.disable_deblocking_filter_idc)?;
        out.write_u16::<LittleEndian>(h.slice_id)?;
    }
    Ok(out)
}

/// 构建 `DXVA_Qmatrix_H264`
pub fn write_qmatrix(pic: &H264Picture) -> TaoResult<Vec<u8>> {
    let mut out = Vec::with_capacity(QMATRIX_SIZE);
    for list in &pic.params.scaling_lists_4x4 {
        out.write_all(list)?;
    }
    for list in &pic.params.scaling_lists_8x8 {
        out.write_all(list)?;
    }
    Ok(out)
}
