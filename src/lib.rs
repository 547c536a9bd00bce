//! # Tao 硬件加速解码
//!
//! 在硬件解码接口之上管理解码表面、提交逐帧缓冲区并按显示顺序输出图像.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use tao_hwaccel::config::AppConfig;
//!
//! let config = AppConfig::from_json_str(r#"{ "decoder": { "surface_count": 16 } }"#)?;
//! let decoder_config = config.decoder_config();
//! assert_eq!(decoder_config.surface_count, 16);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `tao-core` | 错误类型, 有理数, 比特流读取 |
//! | `tao-dxva` | 图像存储区, 加速引擎, 编解码器协议 |

use std::sync::Arc;

use tao_core::TaoResult;
use tao_dxva::{
    CodecPictureProtocol, DecoderConfig, DownstreamSink, DxvaDecoder, LegacyAccelerator,
    LegacyEngine, ModernAccelerator, ModernEngine, Sleeper,
};

pub mod config;
pub mod logging;

/// 核心类型与工具
pub use tao_core as core;

/// 硬件解码引擎
pub use tao_dxva as dxva;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 在旧式加速器上创建解码器.
///
/// `sleeper` 为 `None` 时重试间隔使用线程休眠.
pub fn legacy_decoder(
    accel: Box<dyn LegacyAccelerator>,
    sink: Box<dyn DownstreamSink>,
    config: DecoderConfig,
    codec: Box<dyn CodecPictureProtocol>,
    sleeper: Option<Arc<dyn Sleeper>>,
) -> TaoResult<DxvaDecoder> {
    let mut engine = LegacyEngine::new(accel, config.retry);
    if let Some(sleeper) = sleeper {
        engine = engine.with_sleeper(sleeper);
    }
    DxvaDecoder::new(Box::new(engine), sink, config, codec)
}

/// 在新式加速器 (视频解码服务) 上创建解码器
pub fn modern_decoder(
    accel: Box<dyn ModernAccelerator>,
    sink: Box<dyn DownstreamSink>,
    config: DecoderConfig,
    codec: Box<dyn CodecPictureProtocol>,
    sleeper: Option<Arc<dyn Sleeper>>,
) -> TaoResult<DxvaDecoder> {
    let mut engine = ModernEngine::new(accel, config.retry);
    if let Some(sleeper) = sleeper {
        engine = engine.with_sleeper(sleeper);
    }
    DxvaDecoder::new(Box::new(engine), sink, config, codec)
}
