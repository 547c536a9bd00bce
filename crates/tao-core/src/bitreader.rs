//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 从字节缓冲区读取定长字段, 用于解析序列头等扩展数据.

use crate::{TaoError, TaoResult};

/// 比特流读取器
///
/// # 示例
/// ```
/// use tao_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
/// ```
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 读取 1 个位并转换为布尔值
    pub fn read_flag(&mut self) -> TaoResult<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// 读取 N 个位 (最多 32 位)
    pub fn read_bits(&mut self, n: u32) -> TaoResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(TaoError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(TaoError::Eof);
        }

        let mut result: u32 = 0;
        let mut remaining = n;
        while remaining > 0 {
            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;
            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }
        Ok(result)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> TaoResult<()> {
        if (n as usize) > self.bits_left() {
            return Err(TaoError::Eof);
        }
        let total_bits = self.bit_pos as u32 + n;
        self.byte_pos += (total_bits / 8) as usize;
        self.bit_pos = (total_bits % 8) as u8;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits_basic() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);

        assert!(br.read_flag().unwrap());
        assert!(!br.read_flag().unwrap());
        assert_eq!(br.read_bits(2).unwrap(), 0b11);
        assert_eq!(br.read_bits(4).unwrap(), 0b0001);
        assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
        assert_eq!(br.bits_left(), 0);
    }

    #[test]
    fn test_跨字节读取与跳过() {
        let data = [0xFF, 0x00, 0xFF, 0x00];
        let mut br = BitReader::new(&data);
        br.skip_bits(4).unwrap();
        assert_eq!(br.read_bits(12).unwrap(), 0xF00);
        assert_eq!(br.bits_read(), 16);
        assert_eq!(br.read_bits(16).unwrap(), 0xFF00);
    }

    #[test]
    fn test_越界读取返回eof() {
        let data = [0xAB];
        let mut br = BitReader::new(&data);
        assert!(matches!(br.read_bits(9), Err(TaoError::Eof)));
        assert!(matches!(br.skip_bits(9), Err(TaoError::Eof)));
        assert!(br.read_bits(33).is_err());
    }
}
