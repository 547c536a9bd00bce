//! MPEG-2 码流改写: 从第一个条带起始码 `00 00 01 01` 开始拷贝, 并记录各条带位置.

use tao_core::{TaoError, TaoResult};

use crate::codecs::find_start_code;
use crate::decoder::BitstreamRewriter;
use crate::engine::copy_into;

const FIRST_SLICE_CODE: u8 = 0x01;
const LAST_SLICE_CODE: u8 = 0xAF;

/// 条带在硬件码流缓冲区中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mpeg2SliceLocation {
    pub offset: usize,
    pub size: usize,
    /// 宏块行号 (slice_vertical_position - 1)
    pub mb_y: u16,
}

/// MPEG-2 码流改写器
#[derive(Debug, Clone, Default)]
pub struct Mpeg2Rewriter {
    slices: Vec<Mpeg2SliceLocation>,
}

impl Mpeg2Rewriter {
    /// 最近一次改写得到的条带位置
    pub fn slices(&self) -> &[Mpeg2SliceLocation] {
        &self.slices
    }
}

fn is_slice_code(code: u8) -> bool {
    (FIRST_SLICE_CODE..=LAST_SLICE_CODE).contains(&code)
}

impl BitstreamRewriter for Mpeg2Rewriter {
    fn copy_bitstream(&mut self, dst: &mut [u8], src: &[u8]) -> TaoResult<usize> {
        self.slices.clear();
        let mut pos = 0;
        let begin = loop {
            let Some(sc) = find_start_code(src, pos) else {
                return Err(TaoError::InvalidData(
                    "MPEG2: 访问单元中没有条带起始码".into(),
                ));
            };
            if src.get(sc + 3) == Some(&FIRST_SLICE_CODE) {
                break sc;
            }
            pos = sc + 3;
        };
        let payload = &src[begin..];
        let written = copy_into(dst, payload)?;

        let mut cursor = Some(0);
        while let Some(sc) = cursor {
            let next = find_start_code(payload, sc + 3);
            let code = payload.get(sc + 3).copied().unwrap_or(0);
            if is_slice_code(code) {
                let end = next.unwrap_or(payload.len());
                self.slices.push(Mpeg2SliceLocation {
                    offset: sc,
                    size: end - sc,
                    mb_y: u16::from(code - 1),
                });
            }
            cursor = next;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_从第一个条带开始拷贝() {
        let src = [
            0x00, 0x00, 0x01, 0x00, 0x11, // 图像头
            0x00, 0x00, 0x01, 0xB5, 0x22, // 扩展
            0x00, 0x00, 0x01, 0x01, 0xAA, 0xBB, // 条带 1
            0x00, 0x00, 0x01, 0x02, 0xCC, // 条带 2
        ];
        let mut rw = Mpeg2Rewriter::default();
        let mut dst = vec![0u8; 64];
        assert_eq!(rw.copy_bitstream(&mut dst, &src).unwrap(), 11);
        assert_eq!(&dst[..4], &[0x00, 0x00, 0x01, 0x01]);
        assert_eq!(
            rw.slices(),
            &[
                Mpeg2SliceLocation {
                    offset: 0,
                    size: 6,
                    mb_y: 0
                },
                Mpeg2SliceLocation {
                    offset: 6,
                    size: 5,
                    mb_y: 1
                },
            ]
        );
    }

    #[test]
    fn test_非条带起始码结束条带() {
        let src = [
            0x00, 0x00, 0x01, 0x01, 0xAA, // 条带
            0x00, 0x00, 0x01, 0xB2, 0xEE, // 用户数据
        ];
        let mut rw = Mpeg2Rewriter::default();
        let mut dst = vec![0u8; 16];
        rw.copy_bitstream(&mut dst, &src).unwrap();
        assert_eq!(rw.slices().len(), 1);
        assert_eq!(rw.slices()[0].size, 5);
    }

    #[test]
    fn test_没有条带报错() {
        let mut rw = Mpeg2Rewriter::default();
        let mut dst = vec![0u8; 16];
        assert!(matches!(
            rw.copy_bitstream(&mut dst, &[0x00, 0x00, 0x01, 0xB3, 0x10]),
            Err(TaoError::InvalidData(_))
        ));
    }

    #[test]
    fn test_目标缓冲区不足() {
        let mut rw = Mpeg2Rewriter::default();
        let mut dst = vec![0u8; 3];
        let src = [0x00, 0x00, 0x01, 0x01, 0xAA];
        assert!(matches!(
            rw.copy_bitstream(&mut dst, &src),
            Err(TaoError::BufferOverflow {
                needed: 5,
                available: 3
            })
        ));
    }
}
