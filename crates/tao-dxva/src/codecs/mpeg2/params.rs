//! MPEG-2 图像参数与条带信息.

use tao_core::TaoResult;

use super::bitstream::Mpeg2SliceLocation;
use super::picture::{Mpeg2Picture, Mpeg2Slice};
use crate::codecs::picture_params::{PictureParameters, SliceInfo, mb_count, write_slice_infos};
use crate::codecs::ref_window::RefWindow;
use crate::sample::PictureType;
use crate::surface::SurfaceIndex;

/// 构建 MPEG-2 的 `DXVA_PictureParameters`
pub fn build_picture_params(
    pic: &Mpeg2Picture,
    curr: SurfaceIndex,
    refs: &RefWindow,
    width: u32,
    height: u32,
) -> PictureParameters {
    let field = pic.field_type.is_field();
    let mut pp = PictureParameters::macroblock_420(width, height);
    pp.pic_height_in_mb_minus1 = (mb_count(height) >> u8::from(field)).saturating_sub(1);

    let intra = pic.picture_type == PictureType::I;
    let bidirectional = pic.picture_type == PictureType::B;
    let (forward, backward) = refs.ref_indices(intra, bidirectional, pic.second_field);
    pp.decoded_picture_index = curr.raw();
    pp.deblocked_picture_index = 0;
    pp.forward_ref_picture_index = forward;
    pp.backward_ref_picture_index = backward;

    let structure = pic.field_type.picture_structure();
    pp.pic_structure = structure;
    pp.second_field = u8::from(field && pic.second_field);
    pp.pic_intra = u8::from(intra);
    pp.pic_backward_prediction = u8::from(bidirectional);
    pp.pic_scan_fixed = 1;
    pp.pic_scan_method = u8::from(pic.alternate_scan);

    let [[f00, f01], [f10, f11]] = pic.f_codes.map(|s| s.map(|f| u16::from(f & 0x0F)));
    pp.bitstream_fcodes = (f00 << 12) | (f01 << 8) | (f10 << 4) | f11;
    pp.bitstream_pce_elements = (u16::from(pic.intra_dc_precision & 0x03) << 14)
        | (u16::from(structure) << 12)
        | (u16::from(pic.top_field_first) << 11)
        | (u16::from(pic.frame_pred_frame_dct) << 10)
        | (u16::from(pic.concealment_motion_vectors) << 9)
        | (u16::from(pic.q_scale_type) << 8)
        | (u16::from(pic.intra_vlc_format) << 7)
        | (u16::from(pic.alternate_scan) << 6)
        | (u16::from(pic.repeat_first_field) << 5)
        | (u16::from(pic.chroma_420_type) << 4)
        | (u16::from(pic.progressive_frame) << 3);
    pp
}

/// 按条带位置与头部构建 `DXVA_SliceInfo` 数组.
///
/// 每个条带的宏块数为到下一条带首宏块的距离, 最后一个条带延伸到图像末尾.
pub fn build_slice_infos(
    pp: &PictureParameters,
    locations: &[Mpeg2SliceLocation],
    headers: &[Mpeg2Slice],
) -> TaoResult<Vec<u8>> {
    let mb_width = u32::from(pp.pic_width_in_mb_minus1) + 1;
    let total = mb_width * (u32::from(pp.pic_height_in_mb_minus1) + 1);
    let first_mbs: Vec<u32> = locations
        .iter()
        .enumerate()
        .map(|(i, loc)| {
            let mb_x = headers.get(i).map_or(0, |h| u32::from(h.mb_x));
            u32::from(loc.mb_y) * mb_width + mb_x
        })
        .collect();

    let infos: Vec<SliceInfo> = locations
        .iter()
        .enumerate()
        .map(|(i, loc)| {
            let header = headers.get(i).copied().unwrap_or_default();
            let end = first_mbs.get(i + 1).copied().unwrap_or(total);
            SliceInfo {
                horizontal_position: header.mb_x,
                vertical_position: loc.mb_y,
                slice_bits_in_buffer: u32::try_from(loc.size * 8).unwrap_or(u32::MAX),
                slice_data_location: u32::try_from(loc.offset).unwrap_or(u32::MAX),
                start_code_bit_offset: 0,
                mb_bit_offset: header.mb_bit_offset,
                number_mbs_in_slice: u16::try_from(end.saturating_sub(first_mbs[i]))
                    .unwrap_or(u16::MAX),
                quantizer_scale_code: header.quantizer_scale_code,
            }
        })
        .collect();
    write_slice_infos(&infos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::picture_params::SLICE_INFO_SIZE;
    use crate::sample::FieldType;
    use crate::surface::NO_REF_FRAME;

    #[test]
    fn test_p_帧参数() {
        let mut refs = RefWindow::default();
        refs.advance(SurfaceIndex::new(2));
        let mut pic = Mpeg2Picture::new(PictureType::P, 1);
        pic.f_codes = [[1, 2], [3, 4]];
        let pp = build_picture_params(&pic, SurfaceIndex::new(6), &refs, 720, 576);
        assert_eq!(pp.decoded_picture_index, 6);
        assert_eq!(pp.forward_ref_picture_index, 2);
        assert_eq!(pp.backward_ref_picture_index, NO_REF_FRAME);
        assert_eq!(pp.bitstream_fcodes, 0x1234);
        assert_eq!(pp.pic_width_in_mb_minus1, 44);
        assert_eq!(pp.pic_height_in_mb_minus1, 35);
        // structure=3, top_field_first, frame_pred_frame_dct, chroma_420_type, progressive_frame
        assert_eq!(
            pp.bitstream_pce_elements,
            (3 << 12) | (1 << 11) | (1 << 10) | (1 << 4) | (1 << 3)
        );
    }

    #[test]
    fn test_场图像高度减半() {
        let mut pic = Mpeg2Picture::new(PictureType::I, 0);
        pic.field_type = FieldType::BottomField;
        pic.second_field = true;
        let pp = build_picture_params(&pic, SurfaceIndex::new(0), &RefWindow::default(), 720, 576);
        assert_eq!(pp.pic_height_in_mb_minus1, 17);
        assert_eq!(pp.pic_structure, 2);
        assert_eq!(pp.second_field, 1);
        assert_eq!(pp.pic_intra, 1);
    }

    #[test]
    fn test_条带宏块数() {
        // 4x2 宏块, 两个条带分别从第 0 行与第 1 行第 1 列开始
        let pp = PictureParameters::macroblock_420(64, 32);
        let locations = [
            Mpeg2SliceLocation {
                offset: 0,
                size: 10,
                mb_y: 0,
            },
            Mpeg2SliceLocation {
                offset: 10,
                size: 4,
                mb_y: 1,
            },
        ];
        let headers = [
            Mpeg2Slice::default(),
            Mpeg2Slice {
                mb_x: 1,
                mb_bit_offset: 38,
                quantizer_scale_code: 8,
            },
        ];
        let bytes = build_slice_infos(&pp, &locations, &headers).unwrap();
        assert_eq!(bytes.len(), 2 * SLICE_INFO_SIZE);
        assert_eq!(&bytes[16..18], &[5, 0]);
        let second = &bytes[SLICE_INFO_SIZE..];
        assert_eq!(&second[0..2], &[1, 0]);
        assert_eq!(&second[2..4], &[1, 0]);
        assert_eq!(&second[4..8], &32u32.to_le_bytes());
        assert_eq!(&second[8..12], &10u32.to_le_bytes());
        assert_eq!(&second[14..16], &[38, 0]);
        assert_eq!(&second[16..18], &[3, 0]);
        assert_eq!(&second[18..20], &[8, 0]);
    }
}
