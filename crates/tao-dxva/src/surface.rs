//! 解码表面句柄.
//!
//! 表面由图像存储区的槽位数组统一持有, 句柄只是数组下标, 不单独释放.

use std::fmt;

/// 无参考帧时写入参数块的索引值
pub const NO_REF_FRAME: u16 = 0xFFFF;

/// 解码表面索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceIndex(u16);

impl SurfaceIndex {
    /// 由原始下标创建
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// 作为数组下标使用
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    /// 写入硬件参数块的 16 位索引
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// 写入 7 位图像条目 (H.264 `Index7Bits`)
    pub const fn index7(self) -> u8 {
        (self.0 & 0x7F) as u8
    }
}

impl fmt::Display for SurfaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 将可选的参考表面转换为参数块索引
pub fn ref_index(surface: Option<SurfaceIndex>) -> u16 {
    surface.map(SurfaceIndex::raw).unwrap_or(NO_REF_FRAME)
}
