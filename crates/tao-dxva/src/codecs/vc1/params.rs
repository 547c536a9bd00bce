//! VC-1 图像参数与条带信息.

use tao_core::TaoResult;

use super::picture::{Vc1Picture, Vc1Profile, Vc1SequenceInfo};
use crate::buffers::AccelConfig;
use crate::codecs::picture_params::{PictureParameters, SliceInfo, write_slice_infos};
use crate::codecs::ref_window::RefWindow;
use crate::surface::SurfaceIndex;

/// 构建 VC-1 的 `DXVA_PictureParameters`
pub fn build_picture_params(
    pic: &Vc1Picture,
    seq: &Vc1SequenceInfo,
    accel: AccelConfig,
    curr: SurfaceIndex,
    refs: &RefWindow,
    size: (u32, u32),
    scan_method: u8,
) -> PictureParameters {
    let (width, height) = seq.coded_size.unwrap_or(size);
    let mut pp = PictureParameters::macroblock_420(width, height);
    let (forward, backward) =
        refs.ref_indices(pic.is_intra(), pic.is_backward_predicted(), pic.second_field);
    let advanced = seq.profile == Vc1Profile::Advanced;

    pp.decoded_picture_index = curr.raw();
    pp.deblocked_picture_index = curr.raw();
    pp.forward_ref_picture_index = forward;
    pp.backward_ref_picture_index = backward;
    pp.pic_structure = pic.field_type.picture_structure();
    pp.second_field = u8::from(pic.second_field);
    pp.pic_intra = u8::from(pic.is_intra());
    pp.pic_backward_prediction = u8::from(pic.is_backward_predicted());
    pp.bidirectional_averaging_mode = 0x80
        | (u8::from(accel.intra_resid_unsigned) << 6)
        | (u8::from(accel.resid_diff_accelerator) << 5)
        | (u8::from(pic.intensity_compensation) << 4)
        | (u8::from(advanced) << 3);
    pp.mv_precision_and_chroma_relation =
        (u8::from(pic.half_pel_bilinear) << 3) | (1 << 2) | u8::from(!seq.fast_uv_mc);
    pp.pic_scan_fixed = 0;
    pp.pic_scan_method = scan_method;
    pp.rcontrol = u8::from(pic.rounding_control);
    pp.pic_spatial_resid8 = (u8::from(seq.overlap && pic.pquant >= 9) << 7)
        | (u8::from(seq.overlap) << 6);
    pp.pic_overflow_blocks = 0;
    pp.pic_extrapolation = if seq.interlace { 2 } else { 1 };
    pp.pic_deblocked = (u8::from(advanced && seq.overlap && pic.pquant >= 9) << 6)
        | (u8::from(seq.loop_filter) << 1);
    pp.pic_deblock_confined = u8::from(advanced) << 7;
    pp.pic_4mv_allowed = u8::from(pic.four_mv);
    pp.reserved_bits = pic.pquant;
    pp
}

/// 整帧作为一个条带的 `DXVA_SliceInfo`
pub fn build_slice_info(
    pp: &PictureParameters,
    bitstream_len: usize,
    mb_bit_offset: u16,
) -> TaoResult<Vec<u8>> {
    let mbs = u32::from(pp.pic_width_in_mb_minus1 + 1) * u32::from(pp.pic_height_in_mb_minus1 + 1);
    let info = SliceInfo {
        slice_bits_in_buffer: u32::try_from(bitstream_len * 8).unwrap_or(u32::MAX),
        mb_bit_offset,
        number_mbs_in_slice: u16::try_from(mbs).unwrap_or(u16::MAX),
        quantizer_scale_code: 1,
        ..SliceInfo::default()
    };
    write_slice_infos(&[info])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::PictureType;
    use crate::surface::NO_REF_FRAME;

    fn window() -> RefWindow {
        let mut w = RefWindow::default();
        w.advance(SurfaceIndex::new(1));
        w.advance(SurfaceIndex::new(2));
        w
    }

    #[test]
    fn test_b_帧参考与平均模式() {
        let pic = Vc1Picture::new(PictureType::B);
        let seq = Vc1SequenceInfo {
            profile: Vc1Profile::Advanced,
            ..Vc1SequenceInfo::default()
        };
        let pp = build_picture_params(
            &pic,
            &seq,
            AccelConfig::default(),
            SurfaceIndex::new(5),
            &window(),
            (1280, 720),
            7,
        );
        assert_eq!(pp.decoded_picture_index, 5);
        assert_eq!(pp.forward_ref_picture_index, 1);
        assert_eq!(pp.backward_ref_picture_index, 2);
        assert_eq!(pp.pic_backward_prediction, 1);
        // 默认加速配置: resid_diff_accelerator=1, 高级档次
        assert_eq!(pp.bidirectional_averaging_mode, 0x80 | 0x20 | 0x08);
        assert_eq!(pp.pic_scan_method, 7);
        assert_eq!(pp.pic_width_in_mb_minus1, 79);
        assert_eq!(pp.pic_height_in_mb_minus1, 44);
    }

    #[test]
    fn test_i_帧没有参考() {
        let pic = Vc1Picture::new(PictureType::I);
        let seq = Vc1SequenceInfo {
            loop_filter: true,
            coded_size: Some((640, 480)),
            ..Vc1SequenceInfo::default()
        };
        let pp = build_picture_params(
            &pic,
            &seq,
            AccelConfig::default(),
            SurfaceIndex::new(0),
            &window(),
            (1920, 1080),
            0,
        );
        assert_eq!(pp.forward_ref_picture_index, NO_REF_FRAME);
        assert_eq!(pp.backward_ref_picture_index, NO_REF_FRAME);
        assert_eq!(pp.pic_intra, 1);
        assert_eq!(pp.pic_deblocked, 2);
        assert_eq!(pp.pic_width_in_mb_minus1, 39);
    }

    #[test]
    fn test_条带信息() {
        let pp = PictureParameters::macroblock_420(32, 32);
        let bytes = build_slice_info(&pp, 128, 32).unwrap();
        assert_eq!(&bytes[4..8], &1024u32.to_le_bytes());
        assert_eq!(&bytes[14..16], &[32, 0]);
        assert_eq!(&bytes[16..18], &[4, 0]);
        assert_eq!(&bytes[18..20], &[1, 0]);
    }
}
