//! 硬件加速引擎抽象.
//!
//! 两代加速接口 (旧式按索引寻址 / 新式基于服务) 共用一套提交协议:
//!
//! 1. `begin_frame` 锁定目标表面 (pending 时有界重试)
//! 2. 多次 `add_execute_buffer` 把参数块/码流/条带控制/量化矩阵写入硬件缓冲区
//! 3. `execute` 一次提交所有缓冲区, 无论成败都释放缓冲区
//! 4. `end_frame` 结束本帧
//!
//! 引擎在解码器构造时选定一次, 运行期不会混用.

mod legacy;
mod modern;

use std::fmt;

use thiserror::Error;
use tao_core::{TaoError, TaoResult};

use crate::buffers::{AccelConfig, CompressedBufferType};
use crate::codec_id::DecoderMode;
use crate::sample::{DisplayInfo, OutputSample};
use crate::sink::DownstreamSink;
use crate::store::PictureStore;
use crate::surface::SurfaceIndex;

pub use legacy::{DXVA_DECODE_FUNCTION, LegacyAccelerator, LegacyEngine, SURFACE_TYPE_INDEX};
pub use modern::{ModernAccelerator, ModernEngine};

/// 加速器调用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HwError {
    /// 硬件忙, 稍后重试
    #[error("硬件忙 (pending)")]
    Pending,
    /// 硬件返回错误码
    #[error("硬件错误, hr={0:#010x}")]
    Failed(i32),
}

/// 加速器调用结果
pub type HwResult<T> = Result<T, HwError>;

impl From<HwError> for TaoError {
    fn from(err: HwError) -> Self {
        match err {
            HwError::Pending => TaoError::HardwareBusy,
            HwError::Failed(code) => TaoError::Hardware(format!("hr={:#010x}", code)),
        }
    }
}

/// 把单次 (不重试) 加速器调用结果转为框架错误, 错误信息带上调用名.
///
/// 不重试的调用返回 pending 视为硬件错误.
pub(crate) fn hw_call<T>(what: &str, result: HwResult<T>) -> TaoResult<T> {
    result.map_err(|err| match err {
        HwError::Pending => TaoError::Hardware(format!("{} 返回 pending", what)),
        HwError::Failed(code) => TaoError::Hardware(format!("{} 失败, hr={:#010x}", what, code)),
    })
}

/// 引擎类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// 旧式加速接口 (按索引寻址表面)
    Legacy,
    /// 新式加速接口 (表面绑定在下游样本上)
    Modern,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "DXVA1"),
            Self::Modern => write!(f, "DXVA2"),
        }
    }
}

/// 缓冲区填充回调: 写入目标缓冲区并返回写入字节数
pub type FillFn<'a> = &'a mut dyn FnMut(&mut [u8]) -> TaoResult<usize>;

/// 硬件加速引擎
pub trait AccelEngine: Send {
    /// 引擎类型
    fn kind(&self) -> EngineKind;

    /// 协商解码配置并创建表面
    fn init(&mut self, mode: DecoderMode, surface_count: usize) -> TaoResult<AccelConfig>;

    /// 当前解码配置
    fn config(&self) -> AccelConfig;

    /// 丢弃尚未提交的缓冲区
    fn flush(&mut self);

    /// 开始一帧解码, pending 时有界重试
    fn begin_frame(&mut self, surface: SurfaceIndex) -> TaoResult<()>;

    /// 写入一个逻辑缓冲区
    fn add_execute_buffer(
        &mut self,
        buffer_type: CompressedBufferType,
        fill: FillFn<'_>,
    ) -> TaoResult<()>;

    /// 提交已写入的全部缓冲区, 之后总是释放它们
    fn execute(&mut self) -> TaoResult<()>;

    /// 结束一帧解码
    fn end_frame(&mut self, surface: SurfaceIndex) -> TaoResult<()>;

    /// 查询表面的渲染状态
    fn query_status(&mut self, surface: SurfaceIndex) -> TaoResult<()>;

    /// 获取一个可写入的表面及其样本
    fn get_free_surface(
        &mut self,
        store: &mut PictureStore,
        sink: &mut dyn DownstreamSink,
        width: u32,
        height: u32,
    ) -> TaoResult<(SurfaceIndex, Option<OutputSample>)>;

    /// 把槽位中的图像交付下游
    fn deliver_frame(
        &mut self,
        store: &mut PictureStore,
        sink: &mut dyn DownstreamSink,
        surface: SurfaceIndex,
        info: &DisplayInfo,
    ) -> TaoResult<()>;
}

/// 把源数据原样拷贝进硬件缓冲区
pub fn copy_into(dst: &mut [u8], src: &[u8]) -> TaoResult<usize> {
    if src.len() > dst.len() {
        return Err(TaoError::BufferOverflow {
            needed: src.len(),
            available: dst.len(),
        });
    }
    dst[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_硬件状态映射() {
        assert!(matches!(
            TaoError::from(HwError::Pending),
            TaoError::HardwareBusy
        ));
        let err = hw_call::<()>("execute", Err(HwError::Failed(-1))).unwrap_err();
        assert!(err.to_string().contains("execute 失败"));
        assert!(err.is_hardware());

        let err = hw_call::<()>("end_frame", Err(HwError::Pending)).unwrap_err();
        assert!(err.is_hardware());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_拷贝超出容量返回溢出() {
        let mut dst = [0u8; 4];
        assert_eq!(copy_into(&mut dst, &[1, 2, 3]).unwrap(), 3);
        let err = copy_into(&mut dst, &[0; 8]).unwrap_err();
        assert!(matches!(
            err,
            TaoError::BufferOverflow {
                needed: 8,
                available: 4
            }
        ));
    }
}
