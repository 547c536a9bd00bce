//! H.264 解析器输出.
//!
//! 熵解码与参数集解析由外部解析器完成, 这里只定义硬件参数块所需的字段.

use tao_core::Rational;

use crate::sample::{FieldType, PictureType};

/// 当前激活的 SPS/PPS 中与硬件参数块相关的字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H264ParamSets {
    /// 帧宽 (宏块数)
    pub width_mbs: u16,
    /// 帧高 (宏块数)
    pub height_mbs: u16,
    /// 最大参考帧数
    pub num_ref_frames: u8,
    /// chroma_format_idc
    pub chroma_format_idc: u8,
    /// residual_colour_transform_flag
    pub residual_colour_transform: bool,
    /// frame_mbs_only_flag
    pub frame_mbs_only: bool,
    /// mb_adaptive_frame_field_flag
    pub mb_adaptive_frame_field: bool,
    /// bit_depth_luma_minus8
    pub bit_depth_luma_minus8: u8,
    /// bit_depth_chroma_minus8
    pub bit_depth_chroma_minus8: u8,
    /// log2_max_frame_num_minus4
    pub log2_max_frame_num_minus4: u8,
    /// pic_order_cnt_type
    pub pic_order_cnt_type: u8,
    /// log2_max_pic_order_cnt_lsb_minus4
    pub log2_max_poc_lsb_minus4: u8,
    /// delta_pic_order_always_zero_flag
    pub delta_pic_order_always_zero: bool,
    /// direct_8x8_inference_flag
    pub direct_8x8_inference: bool,
    /// 电平 >= 3.1 时亮度双向预测块最小为 8x8
    pub min_luma_bipred_8x8: bool,
    /// entropy_coding_mode_flag (CABAC)
    pub entropy_coding_mode: bool,
    /// bottom_field_pic_order_in_frame_present_flag
    pub pic_order_present: bool,
    /// num_slice_groups_minus1
    pub num_slice_groups_minus1: u8,
    /// slice_group_map_type
    pub slice_group_map_type: u8,
    /// slice_group_change_rate_minus1
    pub slice_group_change_rate_minus1: u16,
    /// num_ref_idx_l0_default_active_minus1
    pub num_ref_idx_l0_default_minus1: u8,
    /// num_ref_idx_l1_default_active_minus1
    pub num_ref_idx_l1_default_minus1: u8,
    /// weighted_pred_flag
    pub weighted_pred: bool,
    /// weighted_bipred_idc
    pub weighted_bipred_idc: u8,
    /// pic_init_qp_minus26
    pub pic_init_qp_minus26: i8,
    /// pic_init_qs_minus26
    pub pic_init_qs_minus26: i8,
    /// chroma_qp_index_offset
    pub chroma_qp_index_offset: i8,
    /// second_chroma_qp_index_offset
    pub second_chroma_qp_index_offset: i8,
    /// deblocking_filter_control_present_flag
    pub deblocking_filter_control_present: bool,
    /// constrained_intra_pred_flag
    pub constrained_intra_pred: bool,
    /// redundant_pic_cnt_present_flag
    pub redundant_pic_cnt_present: bool,
    /// transform_8x8_mode_flag
    pub transform_8x8_mode: bool,
    /// 4x4 缩放矩阵 (Intra Y/Cb/Cr, Inter Y/Cb/Cr)
    pub scaling_lists_4x4: [[u8; 16]; 6],
    /// 8x8 缩放矩阵 (Intra Y, Inter Y)
    pub scaling_lists_8x8: [[u8; 64]; 2],
}

impl Default for H264ParamSets {
    fn default() -> Self {
        Self {
            width_mbs: 120,
            height_mbs: 68,
            num_ref_frames: 4,
            chroma_format_idc: 1,
            residual_colour_transform: false,
            frame_mbs_only: true,
            mb_adaptive_frame_field: false,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            log2_max_frame_num_minus4: 0,
            pic_order_cnt_type: 0,
            log2_max_poc_lsb_minus4: 0,
            delta_pic_order_always_zero: false,
            direct_8x8_inference: true,
            min_luma_bipred_8x8: true,
            entropy_coding_mode: false,
            pic_order_present: false,
            num_slice_groups_minus1: 0,
            slice_group_map_type: 0,
            slice_group_change_rate_minus1: 0,
            num_ref_idx_l0_default_minus1: 0,
            num_ref_idx_l1_default_minus1: 0,
            weighted_pred: false,
            weighted_bipred_idc: 0,
            pic_init_qp_minus26: 0,
            pic_init_qs_minus26: 0,
            chroma_qp_index_offset: 0,
            second_chroma_qp_index_offset: 0,
            deblocking_filter_control_present: true,
            constrained_intra_pred: false,
            redundant_pic_cnt_present: false,
            transform_8x8_mode: false,
            scaling_lists_4x4: [[16; 16]; 6],
            scaling_lists_8x8: [[16; 64]; 2],
        }
    }
}

impl H264ParamSets {
    /// MaxFrameNum
    pub fn max_frame_num(&self) -> u32 {
        1u32 << (u32::from(self.log2_max_frame_num_minus4) + 4).min(16)
    }
}

/// 参考图像列表中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefPicEntry {
    /// 是否为长期参考
    pub long_term: bool,
    /// 短期参考为 frame_num, 长期参考为 LongTermFrameIdx
    pub num: u32,
    /// 引用底场
    pub bottom_field: bool,
}

/// 单个条带的头部字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct H264Slice {
    /// first_mb_in_slice
    pub first_mb_in_slice: u16,
    /// 条带包含的宏块数 (未知时为 0)
    pub num_mbs_for_slice: u16,
    /// 条带数据相对 NAL 头部的比特偏移
    pub bit_offset_to_slice_data: u16,
    /// slice_type
    pub slice_type: u8,
    /// luma_log2_weight_denom
    pub luma_log2_weight_denom: u8,
    /// chroma_log2_weight_denom
    pub chroma_log2_weight_denom: u8,
    /// num_ref_idx_l0_active_minus1
    pub num_ref_idx_l0_active_minus1: u8,
    /// num_ref_idx_l1_active_minus1
    pub num_ref_idx_l1_active_minus1: u8,
    /// slice_alpha_c0_offset_div2
    pub slice_alpha_c0_offset_div2: i8,
    /// slice_beta_offset_div2
    pub slice_beta_offset_div2: i8,
    /// 重排后的参考图像列表 L0/L1
    pub ref_pic_list: [Vec<RefPicEntry>; 2],
    /// 加权预测表 `[list][ref][Y/Cb/Cr][weight/offset]`
    pub weights: [Vec<[[i16; 2]; 3]>; 2],
    /// slice_qs_delta
    pub slice_qs_delta: i8,
    /// slice_qp_delta
    pub slice_qp_delta: i8,
    /// redundant_pic_cnt
    pub redundant_pic_cnt: u8,
    /// direct_spatial_mv_pred_flag
    pub direct_spatial_mv_pred: bool,
    /// cabac_init_idc
    pub cabac_init_idc: u8,
    /// disable_deblocking_filter_idc
    pub disable_deblocking_filter_idc: u8,
    /// slice_id
    pub slice_id: u16,
}

/// 自适应参考帧标记操作 (MMCO)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmcoOp {
    /// 释放短期参考
    ForgetShort {
        /// difference_of_pic_nums_minus1
        difference_of_pic_nums_minus1: u32,
    },
    /// 释放长期参考
    ForgetLong {
        /// long_term_pic_num
        long_term_pic_num: u32,
    },
    /// 短期参考转为长期参考
    ConvertShortToLong {
        /// difference_of_pic_nums_minus1
        difference_of_pic_nums_minus1: u32,
        /// 目标 LongTermFrameIdx
        long_term_frame_idx: u32,
    },
    /// 截断长期参考索引上限
    TrimLong {
        /// max_long_term_frame_idx_plus1
        max_long_term_frame_idx_plus1: u32,
    },
    /// 清空全部参考
    ClearAll,
    /// 当前图像标记为长期参考
    MarkCurrentLong {
        /// 目标 LongTermFrameIdx
        long_term_frame_idx: u32,
    },
}

/// 参考帧标记方式
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RefMarking {
    /// 滑动窗口
    #[default]
    SlidingWindow,
    /// 自适应标记
    Adaptive(Vec<MmcoOp>),
}

/// 解析器对一个访问单元给出的结果
#[derive(Debug, Clone, PartialEq)]
pub struct H264Picture {
    /// 激活的参数集
    pub params: H264ParamSets,
    /// nal_ref_idc
    pub nal_ref_idc: u8,
    /// 是否为 IDR 图像
    pub is_idr: bool,
    /// 图片类型
    pub picture_type: PictureType,
    /// 场结构
    pub field_type: FieldType,
    /// frame_num
    pub frame_num: u16,
    /// 顶场 POC
    pub top_poc: i32,
    /// 底场 POC
    pub bottom_poc: i32,
    /// sp_for_switch_flag
    pub sp_for_switch: bool,
    /// 全部条带均为帧内条带
    pub intra_pic: bool,
    /// 参考帧标记方式
    pub marking: RefMarking,
    /// IDR 的 long_term_reference_flag
    pub long_term_reference: bool,
    /// 解析器给出的下一幅应输出图像的 POC
    pub output_poc: Option<i32>,
    /// 条带头部, 与访问单元中条带 NAL 的顺序一致
    pub slices: Vec<H264Slice>,
    /// 样本宽高比 (VUI)
    pub sample_aspect: Option<Rational>,
}

impl H264Picture {
    /// 创建只含必要字段的帧图像, 其余字段取默认值
    pub fn new(picture_type: PictureType, frame_num: u16, poc: i32) -> Self {
        Self {
            params: H264ParamSets::default(),
            nal_ref_idc: if picture_type == PictureType::B { 0 } else { 1 },
            is_idr: false,
            picture_type,
            field_type: FieldType::Frame,
            frame_num,
            top_poc: poc,
            bottom_poc: poc,
            sp_for_switch: false,
            intra_pic: matches!(picture_type, PictureType::I | PictureType::Si),
            marking: RefMarking::SlidingWindow,
            long_term_reference: false,
            output_poc: None,
            slices: vec![H264Slice::default()],
            sample_aspect: None,
        }
    }

    /// 当前图像 (帧或单场) 的 POC
    pub fn poc(&self) -> i32 {
        match self.field_type {
            FieldType::TopField => self.top_poc,
            FieldType::BottomField => self.bottom_poc,
            FieldType::Frame => self.top_poc.min(self.bottom_poc),
        }
    }

    /// 是否为参考图像
    pub fn is_reference(&self) -> bool {
        self.nal_ref_idc != 0
    }

    /// 是否为帧内图像 (刷新后可从此处恢复解码)
    pub fn is_keyframe(&self) -> bool {
        self.is_idr || self.intra_pic
    }
}
