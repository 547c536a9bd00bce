//! 编解码器标识符与硬件解码模式.

use std::fmt;

use tao_core::{TaoError, TaoResult};

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    None,
    /// H.264 / AVC
    H264,
    /// VC-1 高级档次 (WVC1)
    Vc1,
    /// VC-1 简单/主档次 (WMV3)
    Wmv3,
    /// MPEG-2 Video
    Mpeg2Video,
    /// MPEG-4 Part 2 (无硬件解码路径)
    Mpeg4,
}

impl CodecId {
    /// 获取编解码器的人类可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::H264 => "h264",
            Self::Vc1 => "vc1",
            Self::Wmv3 => "wmv3",
            Self::Mpeg2Video => "mpeg2video",
            Self::Mpeg4 => "mpeg4",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 硬件解码模式 (加速器以 GUID 标识的解码入口)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderMode {
    /// H.264 VLD, 无胶片颗粒 (受限模式 E)
    H264Vld,
    /// VC-1 VLD (受限模式 D)
    Vc1Vld,
    /// MPEG-2 VLD
    Mpeg2Vld,
}

impl DecoderMode {
    /// 根据编解码器选择解码模式, 未知编解码器在构造期直接失败
    pub fn for_codec(codec_id: CodecId) -> TaoResult<Self> {
        match codec_id {
            CodecId::H264 => Ok(Self::H264Vld),
            CodecId::Vc1 | CodecId::Wmv3 => Ok(Self::Vc1Vld),
            CodecId::Mpeg2Video => Ok(Self::Mpeg2Vld),
            other => Err(TaoError::CodecNotFound(format!(
                "DXVA: {} 没有硬件解码模式",
                other
            ))),
        }
    }

    /// 解码模式 GUID
    pub const fn guid(&self) -> &'static str {
        match self {
            Self::H264Vld => "1b81be68-a0c7-11d3-b984-00c04f2e73c5",
            Self::Vc1Vld => "1b81bea3-a0c7-11d3-b984-00c04f2e73c5",
            Self::Mpeg2Vld => "ee27417f-5e28-4e65-beea-1d26b508adc9",
        }
    }

    /// 旧版接口的受限模式编号
    pub const fn restricted_mode(&self) -> u16 {
        match self {
            Self::H264Vld => 0x68,
            Self::Vc1Vld => 0xA3,
            Self::Mpeg2Vld => 0x0A,
        }
    }

    /// 可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::H264Vld => "H264_VLD",
            Self::Vc1Vld => "VC1_VLD",
            Self::Mpeg2Vld => "MPEG2_VLD",
        }
    }
}

impl fmt::Display for DecoderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
