//! VC-1 码流改写.
//!
//! 硬件要求码流以帧起始码 `00 00 01 0D` 开头 (WMV3 除外) 并补零到 128 字节.
//! 分离器已经带起始码时, 从帧起始码拷贝到访问单元末尾, 其后的条带与第二场数据一并保留.

use tao_core::{TaoError, TaoResult};

use crate::codec_id::CodecId;
use crate::codecs::{find_start_code, padding_for};
use crate::decoder::BitstreamRewriter;
use crate::engine::copy_into;

/// 码流缓冲区对齐
pub const BITSTREAM_ALIGN: usize = 128;

const FRAME_START_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0x0D];

/// VC-1 码流改写器
#[derive(Debug, Clone, Copy)]
pub struct Vc1Rewriter {
    codec: CodecId,
    leading_start_code: bool,
}

impl Vc1Rewriter {
    /// `codec` 为 WMV3 时不插入起始码
    pub fn new(codec: CodecId) -> Self {
        Self {
            codec,
            leading_start_code: false,
        }
    }

    /// 最近一次输出是否以起始码开头
    pub fn leading_start_code(&self) -> bool {
        self.leading_start_code
    }

    /// 起始码占用的比特数, 用于条带信息中的宏块比特偏移
    pub fn start_code_bits(&self) -> u16 {
        if self.leading_start_code { 32 } else { 0 }
    }
}

impl BitstreamRewriter for Vc1Rewriter {
    fn copy_bitstream(&mut self, dst: &mut [u8], src: &[u8]) -> TaoResult<usize> {
        let written = if src.starts_with(&FRAME_START_CODE[..3]) {
            let Some(begin) = find_frame_start(src) else {
                return Err(TaoError::InvalidData("VC1: 找不到帧起始码".into()));
            };
            self.leading_start_code = true;
            copy_into(dst, &src[begin..])?
        } else if self.codec == CodecId::Wmv3 {
            self.leading_start_code = false;
            copy_into(dst, src)?
        } else {
            let needed = FRAME_START_CODE.len() + src.len();
            if needed > dst.len() {
                return Err(TaoError::BufferOverflow {
                    needed,
                    available: dst.len(),
                });
            }
            dst[..4].copy_from_slice(&FRAME_START_CODE);
            dst[4..needed].copy_from_slice(src);
            self.leading_start_code = true;
            needed
        };

        let pad = padding_for(written, BITSTREAM_ALIGN);
        if written + pad > dst.len() {
            return Err(TaoError::BufferOverflow {
                needed: written + pad,
                available: dst.len(),
            });
        }
        dst[written..written + pad].fill(0);
        Ok(written + pad)
    }
}

fn find_frame_start(src: &[u8]) -> Option<usize> {
    let mut pos = 0;
    while let Some(sc) = find_start_code(src, pos) {
        if src.get(sc + 3) == Some(&FRAME_START_CODE[3]) {
            return Some(sc);
        }
        pos = sc + 3;
    }
    None
}
