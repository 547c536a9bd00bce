//! VC-1 扩展数据解析.
//!
//! - 高级档次: 含起始码的序列头 (`00 00 01 0F`) 与入口点头 (`00 00 01 0E`)
//! - 简单/主档次: 4 字节 STRUCT_C

use log::debug;
use tao_core::bitreader::BitReader;
use tao_core::{Rational, TaoError, TaoResult};

use super::picture::{Vc1Profile, Vc1SequenceInfo};
use crate::codecs::find_start_code;

const SEQUENCE_HEADER: u8 = 0x0F;
const ENTRY_POINT: u8 = 0x0E;
const PROFILE_ADVANCED: u32 = 3;

/// 宽高比表, 下标 1..=13
const ASPECT_RATIOS: [(i32, i32); 14] = [
    (0, 0),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
];

/// 解析扩展数据
pub fn parse_extra_data(data: &[u8]) -> TaoResult<Vc1SequenceInfo> {
    let mut info = Vc1SequenceInfo::default();
    if find_start_code(data, 0).is_some() {
        let mut seen_sequence = false;
        let mut pos = 0;
        while let Some(sc) = find_start_code(data, pos) {
            let Some(&code) = data.get(sc + 3) else {
                break;
            };
            let end = find_start_code(data, sc + 4).unwrap_or(data.len());
            let body = &data[sc + 4..end];
            match code {
                SEQUENCE_HEADER => {
                    parse_advanced_sequence(body, &mut info)?;
                    seen_sequence = true;
                }
                ENTRY_POINT => parse_entry_point(body, &mut info)?,
                _ => {}
            }
            pos = end;
        }
        if !seen_sequence {
            return Err(TaoError::InvalidData("VC1: 扩展数据缺少序列头".into()));
        }
    } else {
        parse_struct_c(data, &mut info)?;
    }
    debug!("VC1: 序列信息 {:?}", info);
    Ok(info)
}

fn parse_struct_c(data: &[u8], info: &mut Vc1SequenceInfo) -> TaoResult<()> {
    if data.len() < 4 {
        return Err(TaoError::InvalidData(format!(
            "VC1: 序列头过短, len={}",
            data.len()
        )));
    }
    let mut br = BitReader::new(data);
    info.profile = match br.read_bits(2)? {
        0 => Vc1Profile::Simple,
        1 => Vc1Profile::Main,
        other => {
            return Err(TaoError::Unsupported(format!(
                "VC1: STRUCT_C 档次不支持, profile={other}"
            )));
        }
    };
    // res_y411, res_sprite, frmrtq_postproc, bitrtq_postproc
    br.skip_bits(1 + 1 + 3 + 5)?;
    info.loop_filter = br.read_flag()?;
    // res_x8, multires, res_fasttx
    br.skip_bits(3)?;
    info.fast_uv_mc = br.read_flag()?;
    info.extended_mv = br.read_flag()?;
    // dquant, vstransform, res_transtab
    br.skip_bits(2 + 1 + 1)?;
    info.overlap = br.read_flag()?;
    // syncmarker
    br.skip_bits(1)?;
    info.range_reduction = br.read_flag()?;
    info.max_b_frames = br.read_bits(3)? as u8;
    info.interlace = false;
    Ok(())
}

fn parse_advanced_sequence(body: &[u8], info: &mut Vc1SequenceInfo) -> TaoResult<()> {
    let mut br = BitReader::new(body);
    let profile = br.read_bits(2)?;
    if profile != PROFILE_ADVANCED {
        return Err(TaoError::InvalidData(format!(
            "VC1: 带起始码的序列头档次非法, profile={profile}"
        )));
    }
    info.profile = Vc1Profile::Advanced;
    // level, colordiff_format, frmrtq_postproc, bitrtq_postproc, postprocflag
    br.skip_bits(3 + 2 + 3 + 5 + 1)?;
    let width = (br.read_bits(12)? + 1) * 2;
    let height = (br.read_bits(12)? + 1) * 2;
    info.coded_size = Some((width, height));
    // pulldown
    br.skip_bits(1)?;
    info.interlace = br.read_flag()?;
    // tfcntrflag, finterpflag, reserved, psf
    br.skip_bits(4)?;
    if br.read_flag()? {
        // disp_horiz_size, disp_vert_size
        br.skip_bits(14 + 14)?;
        if br.read_flag()? {
            info.sample_aspect = match br.read_bits(4)? {
                15 => {
                    let num = br.read_bits(8)? + 1;
                    let den = br.read_bits(8)? + 1;
                    Some(Rational::new(num as i32, den as i32))
                }
                idx @ 1..=13 => {
                    let (num, den) = ASPECT_RATIOS[idx as usize];
                    Some(Rational::new(num, den))
                }
                _ => None,
            };
        }
    }
    Ok(())
}

fn parse_entry_point(body: &[u8], info: &mut Vc1SequenceInfo) -> TaoResult<()> {
    let mut br = BitReader::new(body);
    // broken_link, closed_entry, panscan_flag, refdist_flag
    br.skip_bits(4)?;
    info.loop_filter = br.read_flag()?;
    info.fast_uv_mc = br.read_flag()?;
    info.extended_mv = br.read_flag()?;
    // dquant, vstransform
    br.skip_bits(2 + 1)?;
    info.overlap = br.read_flag()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_主档次_struct_c() {
        // profile=01, loop_filter=1, fast_uv_mc=1, overlap=1, max_b_frames=1
        let data = [0x40, 0x08, 0x82, 0x10];
        let info = parse_extra_data(&data).unwrap();
        assert_eq!(info.profile, Vc1Profile::Main);
        assert!(info.loop_filter);
        assert!(info.fast_uv_mc);
        assert!(info.overlap);
        assert_eq!(info.max_b_frames, 1);
        assert!(info.coded_size.is_none());
    }

    #[test]
    fn test_高级档次序列头与入口点() {
        // 序列头: profile=3, 其余 14 位为 0, 宽 (959+1)*2=1920, 高 (539+1)*2=1080
        // interlace=1, display_ext=1, aspect 索引 1 (1:1)
        let mut bits = BitWriter::default();
        bits.put(3, 2);
        bits.put(0, 14);
        bits.put(959, 12);
        bits.put(539, 12);
        bits.put(0, 1);
        bits.put(1, 1);
        bits.put(0, 4);
        bits.put(1, 1);
        bits.put(0, 28);
        bits.put(1, 1);
        bits.put(1, 4);
        let mut data = vec![0x00, 0x00, 0x01, 0x0F];
        data.extend(bits.finish());
        // 入口点: loop_filter=1, overlap=1
        data.extend([0x00, 0x00, 0x01, 0x0E, 0b0000_1000, 0b0010_0000]);

        let info = parse_extra_data(&data).unwrap();
        assert_eq!(info.profile, Vc1Profile::Advanced);
        assert_eq!(info.coded_size, Some((1920, 1080)));
        assert!(info.interlace);
        assert_eq!(info.sample_aspect, Some(Rational::new(1, 1)));
        assert!(info.loop_filter);
        assert!(!info.fast_uv_mc);
        assert!(info.overlap);
    }

    #[test]
    fn test_缺少序列头报错() {
        let data = [0x00, 0x00, 0x01, 0x0E, 0x08, 0x40];
        assert!(matches!(
            parse_extra_data(&data),
            Err(TaoError::InvalidData(_))
        ));
        assert!(parse_extra_data(&[0x40]).is_err());
    }

    #[derive(Default)]
    struct BitWriter {
        bytes: Vec<u8>,
        bit: u32,
    }

    impl BitWriter {
        fn put(&mut self, value: u32, n: u32) {
            for i in (0..n).rev() {
                if self.bit % 8 == 0 {
                    self.bytes.push(0);
                }
                let b = ((value >> i) & 1) as u8;
                let last = self.bytes.len() - 1;
                self.bytes[last] |= b << (7 - self.bit % 8);
                self.bit += 1;
            }
        }

        fn finish(self) -> Vec<u8> {
            self.bytes
        }
    }
}
