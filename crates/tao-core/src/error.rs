//! 统一错误类型定义.
//!
//! 所有 Tao crate 共用的错误类型, 覆盖参数/数据错误与硬件加速会话错误.

use thiserror::Error;

/// Tao 框架统一错误类型
#[derive(Debug, Error)]
pub enum TaoError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作 (例如加速器不支持的解码模式)
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 已到达数据末尾
    #[error("已到达数据末尾")]
    Eof,

    /// 未找到指定的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// 硬件会话错误 (BeginFrame/Execute/EndFrame 失败, 或忙等重试耗尽)
    #[error("硬件错误: {0}")]
    Hardware(String),

    /// 硬件暂时忙 (pending), 仅在重试组合子内部流转
    #[error("硬件忙, 稍后重试")]
    HardwareBusy,

    /// 目标缓冲区不足以容纳本次提交
    #[error("缓冲区溢出: 需要 {needed} 字节, 可用 {available} 字节")]
    BufferOverflow {
        /// 需要的字节数
        needed: usize,
        /// 硬件缓冲区可用字节数
        available: usize,
    },

    /// 下游分配器未提交 (流正在停止)
    #[error("分配器未提交, 流正在停止")]
    NotCommitted,

    /// 没有可用的解码表面
    #[error("没有可用的解码表面")]
    NoFreeSurface,

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl TaoError {
    /// 是否为可重试的暂时性错误
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::HardwareBusy)
    }

    /// 是否为致命的硬件会话错误
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Hardware(_))
    }
}

/// Tao 框架统一 Result 类型
pub type TaoResult<T> = Result<T, TaoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_暂时性错误分类() {
        assert!(TaoError::HardwareBusy.is_transient());
        assert!(!TaoError::Hardware("x".into()).is_transient());
        assert!(!TaoError::NotCommitted.is_transient());
        assert!(TaoError::Hardware("begin_frame".into()).is_hardware());
    }

    #[test]
    fn test_溢出错误信息() {
        let err = TaoError::BufferOverflow {
            needed: 300,
            available: 256,
        };
        assert_eq!(err.to_string(), "缓冲区溢出: 需要 300 字节, 可用 256 字节");
    }
}
