//! MPEG-2 解析器输出.

use tao_core::Rational;

use crate::sample::{FieldType, PictureType};

/// 单个条带的头部字段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mpeg2Slice {
    /// 条带首个宏块的水平位置
    pub mb_x: u16,
    /// 第一个宏块相对条带起始码的比特偏移
    pub mb_bit_offset: u16,
    /// quantiser_scale_code
    pub quantizer_scale_code: u16,
}

/// 解析器对一个图像给出的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Mpeg2Picture {
    pub picture_type: PictureType,
    pub field_type: FieldType,
    pub second_field: bool,
    /// 解码顺序编号
    pub coded_index: i32,
    /// 解析器给出的下一幅应显示图像的解码顺序编号
    pub next_output: Option<i32>,
    /// f_code[s][t]
    pub f_codes: [[u8; 2]; 2],
    pub intra_dc_precision: u8,
    pub top_field_first: bool,
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub alternate_scan: bool,
    pub repeat_first_field: bool,
    pub chroma_420_type: bool,
    pub progressive_frame: bool,
    /// 帧内亮度, 帧间亮度, 帧内色度, 帧间色度; zigzag 顺序
    pub quant_matrices: [[u8; 64]; 4],
    /// 条带头部, 与码流中条带的顺序一致
    pub slices: Vec<Mpeg2Slice>,
    pub sample_aspect: Option<Rational>,
}

impl Mpeg2Picture {
    /// 逐行帧图像, 其余字段取默认值
    pub fn new(picture_type: PictureType, coded_index: i32) -> Self {
        Self {
            picture_type,
            field_type: FieldType::Frame,
            second_field: false,
            coded_index,
            next_output: None,
            f_codes: [[15; 2]; 2],
            intra_dc_precision: 0,
            top_field_first: true,
            frame_pred_frame_dct: true,
            concealment_motion_vectors: false,
            q_scale_type: false,
            intra_vlc_format: false,
            alternate_scan: false,
            repeat_first_field: false,
            chroma_420_type: true,
            progressive_frame: true,
            quant_matrices: [[16; 64]; 4],
            slices: Vec::new(),
            sample_aspect: None,
        }
    }

    /// I/P 图像进入参考窗口
    pub fn is_reference(&self) -> bool {
        self.picture_type != PictureType::B
    }

    /// 刷新后可以从此图像恢复解码
    pub fn is_keyframe(&self) -> bool {
        self.picture_type == PictureType::I
    }
}
