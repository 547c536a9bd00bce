//! 各编解码器的逐帧解码协议.
//!
//! 每帧的公共流程:
//! 1. 由外部解析器从访问单元得到参数与条带边界
//! 2. 刷新后遇到非帧内图像直接返回 `NoOutput`
//! 3. 获取空闲表面
//! 4. begin_frame, 提交参数/码流/条带控制/量化矩阵, execute, end_frame
//! 5. 按编解码器规则更新参考窗口
//! 6. 存入图像并尝试显示
//! 7. 离开刷新状态

pub mod h264;
pub mod mpeg2;
pub mod picture_params;
pub mod ref_window;
pub mod vc1;

use tao_core::TaoResult;

use crate::codec_id::CodecId;
use crate::decoder::{DecodeStatus, DxvaContext};

/// 外部码流解析器
pub trait BitstreamParser: Send {
    /// 解析结果
    type Output;

    /// 解析一个访问单元; 参数尚未就绪时返回 `Ok(None)`
    fn parse(&mut self, data: &[u8]) -> TaoResult<Option<Self::Output>>;

    /// 接收扩展数据中的参数集
    fn set_extra_data(&mut self, _data: &[u8]) -> TaoResult<()> {
        Ok(())
    }

    /// 清空解析状态
    fn reset(&mut self) {}
}

/// 编解码器逐帧协议
pub trait CodecPictureProtocol: Send {
    /// 编解码器标识
    fn codec_id(&self) -> CodecId;

    /// 解码一个访问单元
    fn decode_frame(
        &mut self,
        ctx: &mut DxvaContext,
        data: &[u8],
        start: Option<i64>,
        stop: Option<i64>,
    ) -> TaoResult<DecodeStatus>;

    /// 设置扩展数据
    fn set_extra_data(&mut self, ctx: &mut DxvaContext, data: &[u8]) -> TaoResult<()>;

    /// 显示全部已就绪图像
    fn drain(&mut self, ctx: &mut DxvaContext) -> TaoResult<usize>;

    /// 清空参考窗口与调度状态
    fn flush(&mut self);
}

/// 把数据长度补齐到 `align` 的整数倍后需要的填充字节数
pub(crate) fn padding_for(len: usize, align: usize) -> usize {
    (align - len % align) % align
}

/// 查找 `00 00 01` 起始码, 返回起始码首字节位置
pub(crate) fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < 3 {
        return None;
    }
    (from..data.len() - 2).find(|&i| data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1)
}
