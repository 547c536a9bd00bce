//! 下游输出样本 (OutputSample).
//!
//! 样本与硬件表面一一绑定. 引用计数 (`lease`) 表示当前持有者数量:
//! 分配器只会把无人持有的表面重新分发出去.

use std::sync::Arc;

use bitflags::bitflags;
use tao_core::Rational;

use crate::surface::SurfaceIndex;

/// 图片类型 (I/P/B 帧)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PictureType {
    /// 未指定
    #[default]
    None,
    /// I 帧 (关键帧, 帧内编码)
    I,
    /// P 帧 (前向预测)
    P,
    /// B 帧 (双向预测)
    B,
    /// SI 帧 (切换 I 帧)
    Si,
    /// SP 帧 (切换 P 帧)
    Sp,
}

/// 图像的场结构
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    /// 逐行帧
    #[default]
    Frame,
    /// 顶场
    TopField,
    /// 底场
    BottomField,
}

impl FieldType {
    /// 是否为单场图像
    pub const fn is_field(&self) -> bool {
        !matches!(self, Self::Frame)
    }

    /// 硬件参数块中的 picture_structure 编码 (1=顶场, 2=底场, 3=帧)
    pub const fn picture_structure(&self) -> u8 {
        match self {
            Self::TopField => 1,
            Self::BottomField => 2,
            Self::Frame => 3,
        }
    }
}

bitflags! {
    /// 样本类型相关标志 (低 7 位)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SampleFlags: u32 {
        /// 顶场先显示
        const FIELD1FIRST = 0x04;
        /// 两场交织 (逐行帧)
        const WEAVE = 0x08;
        /// P 样本
        const P_SAMPLE = 0x10;
        /// B 样本
        const B_SAMPLE = 0x20;
        /// 重复场
        const REPEAT_FIELD = 0x40;
    }
}

impl SampleFlags {
    /// I/P/B 类型掩码
    pub const IPB_MASK: Self = Self::P_SAMPLE.union(Self::B_SAMPLE);

    /// 按存储的场结构与图片类型构建标志
    pub fn for_picture(field_type: FieldType, picture_type: PictureType) -> Self {
        let mut flags = match field_type {
            FieldType::Frame => Self::WEAVE,
            FieldType::TopField => Self::FIELD1FIRST,
            FieldType::BottomField => Self::empty(),
        };
        flags |= match picture_type {
            PictureType::I | PictureType::Si => Self::empty(),
            PictureType::P | PictureType::Sp => Self::P_SAMPLE,
            _ => Self::B_SAMPLE,
        };
        flags
    }
}

#[derive(Debug)]
struct SurfaceLease {
    surface: Option<SurfaceIndex>,
}

/// 输出样本
#[derive(Debug, Clone)]
pub struct OutputSample {
    lease: Arc<SurfaceLease>,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 显示开始时间 (100ns 单位)
    pub start: Option<i64>,
    /// 显示结束时间 (100ns 单位)
    pub stop: Option<i64>,
    /// 类型相关标志
    pub flags: SampleFlags,
    /// 图片类型
    pub picture_type: PictureType,
    /// 显示宽高比, 仅在宽高比发生变化后携带
    pub display_aspect: Option<Rational>,
}

impl OutputSample {
    /// 创建绑定到指定表面的样本 (新式引擎的分配器样本)
    pub fn for_surface(surface: SurfaceIndex, width: u32, height: u32) -> Self {
        Self::with_lease(Some(surface), width, height)
    }

    /// 创建不绑定表面的样本 (旧式引擎由加速器自行填充)
    pub fn unbound(width: u32, height: u32) -> Self {
        Self::with_lease(None, width, height)
    }

    fn with_lease(surface: Option<SurfaceIndex>, width: u32, height: u32) -> Self {
        Self {
            lease: Arc::new(SurfaceLease { surface }),
            width,
            height,
            start: None,
            stop: None,
            flags: SampleFlags::empty(),
            picture_type: PictureType::None,
            display_aspect: None,
        }
    }

    /// 样本绑定的硬件表面
    pub fn surface(&self) -> Option<SurfaceIndex> {
        self.lease.surface
    }

    /// 当前持有该表面的句柄数量
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.lease)
    }

    /// 是否与另一个样本共享同一租约
    pub fn shares_lease(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.lease, &other.lease)
    }
}

/// 显示时写入样本的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 显示开始时间
    pub start: Option<i64>,
    /// 显示结束时间
    pub stop: Option<i64>,
    /// 类型相关标志
    pub flags: SampleFlags,
    /// 图片类型
    pub picture_type: PictureType,
    /// 显示宽高比
    pub display_aspect: Option<Rational>,
}

impl DisplayInfo {
    /// 把元数据写入样本
    pub fn apply(&self, sample: &mut OutputSample) {
        sample.start = self.start;
        sample.stop = self.stop;
        sample.flags = self.flags;
        sample.picture_type = self.picture_type;
        sample.display_aspect = self.display_aspect;
    }
}
