//! VC-1 解析器输出与序列信息.

use tao_core::Rational;

use crate::sample::{FieldType, PictureType};

/// VC-1 档次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vc1Profile {
    /// 简单档次
    Simple,
    /// 主档次 (WMV3)
    #[default]
    Main,
    /// 高级档次 (WVC1)
    Advanced,
}

/// 由扩展数据得到的序列级信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vc1SequenceInfo {
    pub profile: Vc1Profile,
    pub interlace: bool,
    pub loop_filter: bool,
    pub overlap: bool,
    pub fast_uv_mc: bool,
    pub extended_mv: bool,
    pub range_reduction: bool,
    pub max_b_frames: u8,
    /// 高级档次序列头给出的编码尺寸
    pub coded_size: Option<(u32, u32)>,
    /// 高级档次显示扩展给出的样本宽高比
    pub sample_aspect: Option<Rational>,
}

/// 解析器对一帧给出的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vc1Picture {
    /// I/P/B
    pub picture_type: PictureType,
    /// BI 图像 (按帧内图像解码, 不作参考)
    pub bi: bool,
    pub field_type: FieldType,
    pub second_field: bool,
    /// 跳过帧, 没有需要解码的数据
    pub skipped: bool,
    /// RNDCTRL
    pub rounding_control: bool,
    /// PQUANT
    pub pquant: u8,
    /// MVMODE 为 1MV 半像素双线性
    pub half_pel_bilinear: bool,
    /// MVMODE 允许 4MV
    pub four_mv: bool,
    /// 亮度补偿
    pub intensity_compensation: bool,
    /// 图像头部比特数 (不含起始码)
    pub header_bits: u16,
}

impl Vc1Picture {
    /// 逐行帧图像, 其余字段取默认值
    pub fn new(picture_type: PictureType) -> Self {
        Self {
            picture_type,
            bi: false,
            field_type: FieldType::Frame,
            second_field: false,
            skipped: false,
            rounding_control: false,
            pquant: 4,
            half_pel_bilinear: false,
            four_mv: false,
            intensity_compensation: false,
            header_bits: 0,
        }
    }

    /// bPicIntra
    pub fn is_intra(&self) -> bool {
        self.picture_type == PictureType::I || self.bi
    }

    /// bPicBackwardPrediction: 真正的 B 图像
    pub fn is_backward_predicted(&self) -> bool {
        self.picture_type == PictureType::B && !self.bi
    }

    /// 除真正的 B 图像外都进入参考窗口 (含 BI)
    pub fn is_reference(&self) -> bool {
        !self.is_backward_predicted()
    }
}
