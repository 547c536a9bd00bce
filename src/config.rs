//! 应用配置 (JSON).
//!
//! ```json
//! {
//!   "logging": { "level": "info", "directory": "logs", "file_prefix": "tao-hwaccel" },
//!   "decoder": { "width": 1280, "height": 720, "surface_count": 16 }
//! }
//! ```
//!
//! 所有字段都有默认值, 缺省的段落与字段按默认值填充.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use tao_dxva::DecoderConfig;
use tao_dxva::RetryPolicy;

use crate::logging::LoggingConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub decoder: DecoderSection,
}

/// 解码器实例参数
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DecoderSection {
    pub width: u32,
    pub height: u32,
    pub surface_count: usize,
    /// 平均帧时长, 100ns 单位
    pub avg_time_per_frame: i64,
    pub reorder_b_frames: bool,
    pub update_aspect_ratio: bool,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for DecoderSection {
    fn default() -> Self {
        let base = DecoderConfig::default();
        Self {
            width: base.width,
            height: base.height,
            surface_count: base.surface_count,
            avg_time_per_frame: base.avg_time_per_frame,
            reorder_b_frames: base.reorder_b_frames,
            update_aspect_ratio: base.update_aspect_ratio,
            retry_attempts: base.retry.max_attempts,
            retry_delay_ms: u64::try_from(base.retry.delay.as_millis()).unwrap_or(1),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("解析配置 JSON 失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败, path={}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("配置文件无效, path={}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        let decoder = &self.decoder;
        ensure!(
            decoder.surface_count > 0 && decoder.surface_count <= usize::from(u16::MAX),
            "surface_count 非法: {}",
            decoder.surface_count
        );
        ensure!(
            decoder.width > 0 && decoder.height > 0,
            "图像尺寸非法: {}x{}",
            decoder.width,
            decoder.height
        );
        ensure!(decoder.retry_attempts > 0, "retry_attempts 必须大于 0");
        Ok(())
    }

    /// 转换为解码器实例配置
    pub fn decoder_config(&self) -> DecoderConfig {
        let d = &self.decoder;
        DecoderConfig {
            width: d.width,
            height: d.height,
            surface_count: d.surface_count,
            avg_time_per_frame: d.avg_time_per_frame,
            reorder_b_frames: d.reorder_b_frames,
            update_aspect_ratio: d.update_aspect_ratio,
            retry: RetryPolicy {
                max_attempts: d.retry_attempts,
                delay: Duration::from_millis(d.retry_delay_ms),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_空配置使用默认值() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config.decoder_config(), DecoderConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn test_部分字段覆盖() {
        let text = r#"{
            "decoder": { "width": 720, "height": 576, "reorder_b_frames": false, "retry_delay_ms": 5 },
            "logging": { "level": "debug" }
        }"#;
        let config = AppConfig::from_json_str(text).unwrap();
        let decoder = config.decoder_config();
        assert_eq!((decoder.width, decoder.height), (720, 576));
        assert!(!decoder.reorder_b_frames);
        assert_eq!(decoder.surface_count, 22);
        assert_eq!(decoder.retry.delay, Duration::from_millis(5));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_非法表面数量被拒绝() {
        let err = AppConfig::from_json_str(r#"{ "decoder": { "surface_count": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("surface_count"));
    }
}
