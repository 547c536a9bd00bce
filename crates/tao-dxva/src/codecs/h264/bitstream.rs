//! H.264 码流改写.
//!
//! 只保留条带 NAL (类型 1 和 5), 每个 NAL 前写入 `00 00 01` 起始码,
//! 总长度补零到 128 字节的整数倍, 填充计入最后一个条带.

use tao_core::{TaoError, TaoResult};

use crate::codecs::padding_for;
use crate::decoder::BitstreamRewriter;
use crate::parsers::h264::{NalUnit, split_annex_b, split_avcc};

/// 码流缓冲区对齐
pub const BITSTREAM_ALIGN: usize = 128;

const START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// 条带在硬件码流缓冲区中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceLocation {
    /// 相对缓冲区起点的偏移
    pub offset: usize,
    /// 字节数 (含起始码)
    pub size: usize,
}

/// H.264 码流改写器
#[derive(Debug, Clone, Default)]
pub struct H264Rewriter {
    nal_length_size: Option<usize>,
    slices: Vec<SliceLocation>,
}

impl H264Rewriter {
    /// Annex B 输入
    pub fn annex_b() -> Self {
        Self::default()
    }

    /// avcC 长度前缀输入
    pub fn length_prefixed(nal_length_size: usize) -> Self {
        Self {
            nal_length_size: Some(nal_length_size),
            slices: Vec::new(),
        }
    }

    /// 设置 NAL 长度前缀大小, `None` 表示 Annex B
    pub fn set_nal_length_size(&mut self, nal_length_size: Option<usize>) {
        self.nal_length_size = nal_length_size;
    }

    /// NAL 长度前缀大小
    pub fn nal_length_size(&self) -> Option<usize> {
        self.nal_length_size
    }

    /// 最近一次改写得到的条带位置
    pub fn slices(&self) -> &[SliceLocation] {
        &self.slices
    }

    /// 拆分访问单元中的 NAL
    pub fn split<'a>(&self, data: &'a [u8]) -> Vec<NalUnit<'a>> {
        match self.nal_length_size {
            Some(size) => split_avcc(data, size),
            None => split_annex_b(data),
        }
    }
}

impl BitstreamRewriter for H264Rewriter {
    fn copy_bitstream(&mut self, dst: &mut [u8], src: &[u8]) -> TaoResult<usize> {
        self.slices.clear();
        let mut pos = 0;
        for nal in self.split(src) {
            if !nal.nal_type.is_slice() {
                continue;
            }
            let size = START_CODE.len() + nal.data.len();
            if pos + size > dst.len() {
                return Err(TaoError::BufferOverflow {
                    needed: pos + size,
                    available: dst.len(),
                });
            }
            dst[pos..pos + START_CODE.len()].copy_from_slice(&START_CODE);
            dst[pos + START_CODE.len()..pos + size].copy_from_slice(nal.data);
            self.slices.push(SliceLocation { offset: pos, size });
            pos += size;
        }

        let Some(last) = self.slices.last_mut() else {
            return Err(TaoError::InvalidData(
                "H264: 访问单元中没有条带 NAL".into(),
            ));
        };
        let pad = padding_for(pos, BITSTREAM_ALIGN);
        if pos + pad > dst.len() {
            return Err(TaoError::BufferOverflow {
                needed: pos + pad,
                available: dst.len(),
            });
        }
        dst[pos..pos + pad].fill(0);
        last.size += pad;
        Ok(pos + pad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access_unit() -> Vec<u8> {
        vec![
            0x00, 0x00, 0x00, 0x01, 0x09, 0xF0, // AUD
            0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, // SPS
            0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21, // IDR slice
            0x00, 0x00, 0x01, 0x41, 0x9A, 0x02, // non-IDR slice
        ]
    }

    #[test]
    fn test_annex_b_只保留条带() {
        let mut rw = H264Rewriter::annex_b();
        let mut dst = vec![0xEEu8; 256];
        let written = rw.copy_bitstream(&mut dst, &access_unit()).unwrap();
        assert_eq!(written, 128);
        assert_eq!(&dst[..7], &[0x00, 0x00, 0x01, 0x65, 0x88, 0x84, 0x21]);
        assert_eq!(&dst[7..13], &[0x00, 0x00, 0x01, 0x41, 0x9A, 0x02]);
        assert!(dst[13..128].iter().all(|&b| b == 0));
        assert_eq!(
            rw.slices(),
            &[
                SliceLocation { offset: 0, size: 7 },
                SliceLocation {
                    offset: 7,
                    size: 121
                }
            ]
        );
    }

    #[test]
    fn test_长度前缀输入() {
        let mut rw = H264Rewriter::length_prefixed(4);
        let src = [0x00, 0x00, 0x00, 0x03, 0x65, 0x11, 0x22];
        let mut dst = vec![0u8; 128];
        assert_eq!(rw.copy_bitstream(&mut dst, &src).unwrap(), 128);
        assert_eq!(&dst[..6], &[0x00, 0x00, 0x01, 0x65, 0x11, 0x22]);
        assert_eq!(rw.slices()[0].size, 128);
    }

    #[test]
    fn test_已对齐不额外填充() {
        let mut rw = H264Rewriter::length_prefixed(1);
        let mut src = vec![125u8, 0x65];
        src.extend(std::iter::repeat_n(0x11, 124));
        let mut dst = vec![0u8; 128];
        assert_eq!(rw.copy_bitstream(&mut dst, &src).unwrap(), 128);
        assert_eq!(rw.slices()[0].size, 128);
    }

    #[test]
    fn test_目标缓冲区不足() {
        let mut rw = H264Rewriter::annex_b();
        let mut dst = vec![0u8; 64];
        let err = rw.copy_bitstream(&mut dst, &access_unit()).unwrap_err();
        assert!(matches!(
            err,
            TaoError::BufferOverflow {
                needed: 128,
                available: 64
            }
        ));
    }

    #[test]
    fn test_没有条带报错() {
        let mut rw = H264Rewriter::annex_b();
        let mut dst = vec![0u8; 128];
        let src = [0x00, 0x00, 0x01, 0x67, 0x42];
        assert!(matches!(
            rw.copy_bitstream(&mut dst, &src),
            Err(TaoError::InvalidData(_))
        ));
    }
}
