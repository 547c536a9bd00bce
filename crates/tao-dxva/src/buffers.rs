//! 压缩缓冲区类型与提交描述.

use std::fmt;

/// 压缩缓冲区类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressedBufferType {
    /// 图像参数
    PictureParameters,
    /// 宏块控制
    MacroblockControl,
    /// 残差数据
    ResidualDifference,
    /// 去块控制
    DeblockingControl,
    /// 反量化矩阵
    InverseQuantizationMatrix,
    /// 条带控制
    SliceControl,
    /// 码流数据
    Bitstream,
}

impl CompressedBufferType {
    /// 新式接口的缓冲区类型编号
    pub const fn modern_type(&self) -> u32 {
        match self {
            Self::PictureParameters => 0,
            Self::MacroblockControl => 1,
            Self::ResidualDifference => 2,
            Self::DeblockingControl => 3,
            Self::InverseQuantizationMatrix => 4,
            Self::SliceControl => 5,
            Self::Bitstream => 6,
        }
    }

    /// 旧式接口的缓冲区类型索引 (比新式编号大 1)
    pub const fn legacy_type_index(&self) -> u32 {
        self.modern_type() + 1
    }

    /// 旧式接口按类型索引分组的缓冲区种类数
    pub const LEGACY_TYPE_COUNT: usize = 8;
}

impl fmt::Display for CompressedBufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PictureParameters => "picture_parameters",
            Self::MacroblockControl => "macroblock_control",
            Self::ResidualDifference => "residual_difference",
            Self::DeblockingControl => "deblocking_control",
            Self::InverseQuantizationMatrix => "inverse_quantization_matrix",
            Self::SliceControl => "slice_control",
            Self::Bitstream => "bitstream",
        };
        f.write_str(name)
    }
}

/// 一次 Execute 中单个缓冲区的描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescription {
    /// 缓冲区类型
    pub buffer_type: CompressedBufferType,
    /// 旧式接口中该类型下的缓冲区编号, 新式接口恒为 0
    pub buffer_index: u32,
    /// 有效数据长度
    pub data_size: u32,
}

/// 加速器协商得到的解码配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelConfig {
    /// 码流原始格式模式: 1 = 长格式条带控制, 2 = 短格式条带控制
    pub bitstream_raw: u8,
    /// 帧内残差是否无符号
    pub intra_resid_unsigned: bool,
    /// 主机端残差差分加速
    pub resid_diff_accelerator: bool,
}

impl Default for AccelConfig {
    fn default() -> Self {
        Self {
            bitstream_raw: 1,
            intra_resid_unsigned: false,
            resid_diff_accelerator: true,
        }
    }
}

impl AccelConfig {
    /// H.264 是否使用长格式条带控制
    pub const fn uses_long_slice(&self) -> bool {
        self.bitstream_raw != 2
    }
}

/// 旧式接口按类型返回的压缩缓冲区信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompBufferInfo {
    /// 该类型的缓冲区个数
    pub count: u32,
    /// 单个缓冲区的字节数
    pub size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_旧式类型索引偏移() {
        assert_eq!(CompressedBufferType::PictureParameters.legacy_type_index(), 1);
        assert_eq!(CompressedBufferType::Bitstream.modern_type(), 6);
        assert_eq!(CompressedBufferType::Bitstream.legacy_type_index(), 7);
    }

    #[test]
    fn test_条带格式由码流模式决定() {
        let mut config = AccelConfig::default();
        assert!(config.uses_long_slice());
        config.bitstream_raw = 2;
        assert!(!config.uses_long_slice());
    }
}
