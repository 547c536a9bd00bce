//! H.264 NAL 单元拆分.
//!
//! 码流改写只需要定位条带 NAL, 因此这里返回借用输入的切片, 不做 RBSP 转换.
//!
//! ```text
//! Annex B: 00 00 01 | NAL | 00 00 00 01 | NAL ...
//! avcC:    [len: 1..4 字节 BE] NAL [len] NAL ...
//! ```

use tao_core::{TaoError, TaoResult};

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    /// 非 IDR 条带
    Slice,
    /// 数据分区 (A/B/C)
    SlicePartition(u8),
    /// IDR 条带
    SliceIdr,
    /// SEI
    Sei,
    /// SPS
    Sps,
    /// PPS
    Pps,
    /// 访问单元分隔符
    Aud,
    /// 其他类型
    Other(u8),
}

impl NalUnitType {
    /// 从 nal_unit_type 创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id {
            1 => Self::Slice,
            2..=4 => Self::SlicePartition(type_id),
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            _ => Self::Other(type_id),
        }
    }

    /// nal_unit_type 数值
    pub fn type_id(&self) -> u8 {
        match *self {
            Self::Slice => 1,
            Self::SlicePartition(id) => id,
            Self::SliceIdr => 5,
            Self::Sei => 6,
            Self::Sps => 7,
            Self::Pps => 8,
            Self::Aud => 9,
            Self::Other(id) => id,
        }
    }

    /// 是否为需要送入硬件的完整条带
    pub fn is_slice(&self) -> bool {
        matches!(self, Self::Slice | Self::SliceIdr)
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SlicePartition(id) => write!(f, "Partition({id})"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::Other(id) => write!(f, "Other({id})"),
        }
    }
}

/// 借用输入数据的 NAL 单元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// 类型
    pub nal_type: NalUnitType,
    /// nal_ref_idc
    pub ref_idc: u8,
    /// 含头部字节, 不含起始码
    pub data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// 解析 NAL 头部
    pub fn parse(data: &'a [u8]) -> TaoResult<Self> {
        let Some(&header) = data.first() else {
            return Err(TaoError::InvalidData("H264: NAL 单元为空".into()));
        };
        if header & 0x80 != 0 {
            return Err(TaoError::InvalidData(format!(
                "H264: forbidden_zero_bit 置位, header=0x{header:02X}"
            )));
        }
        Ok(Self {
            nal_type: NalUnitType::from_type_id(header & 0x1F),
            ref_idc: (header >> 5) & 0x03,
            data,
        })
    }
}

/// 拆分 Annex B 码流, 丢弃非法 NAL 与尾随零字节
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit<'_>> {
    let mut nals = Vec::new();
    let mut cursor = next_payload(data, 0);
    while let Some(begin) = cursor {
        let next = next_payload(data, begin);
        // 下一个起始码 (3 字节部分) 之前即为本 NAL 的范围
        let mut end = next.map_or(data.len(), |p| p - 3);
        while end > begin && data[end - 1] == 0 {
            end -= 1;
        }
        if end > begin {
            if let Ok(nal) = NalUnit::parse(&data[begin..end]) {
                nals.push(nal);
            }
        }
        cursor = next;
    }
    nals
}

/// 拆分长度前缀码流, 截断的尾部被忽略
pub fn split_avcc(data: &[u8], length_size: usize) -> Vec<NalUnit<'_>> {
    if !(1..=4).contains(&length_size) {
        return Vec::new();
    }
    let mut nals = Vec::new();
    let mut rest = data;
    while rest.len() >= length_size {
        let (prefix, body) = rest.split_at(length_size);
        let len = prefix
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
        if len > body.len() {
            break;
        }
        let (nal, tail) = body.split_at(len);
        if let Ok(nal) = NalUnit::parse(nal) {
            nals.push(nal);
        }
        rest = tail;
    }
    nals
}

/// 从 `from` 开始查找 `00 00 01`, 返回其后第一个字节的位置
fn next_payload(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(3)
        .position(|w| w == [0, 0, 1])
        .map(|p| from + p + 3)
}

/// AVCDecoderConfigurationRecord
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvccConfig {
    /// SPS 列表
    pub sps_list: Vec<Vec<u8>>,
    /// PPS 列表
    pub pps_list: Vec<Vec<u8>>,
    /// NAL 长度前缀字节数
    pub length_size: usize,
}

/// 解析 avcC 扩展数据
pub fn parse_avcc_config(data: &[u8]) -> TaoResult<AvccConfig> {
    if data.len() < 7 {
        return Err(TaoError::InvalidData(format!(
            "H264: avcC 数据过短, len={}",
            data.len()
        )));
    }
    let length_size = usize::from(data[4] & 0x03) + 1;
    let mut pos = 6;
    let sps_list = read_param_sets(data, &mut pos, usize::from(data[5] & 0x1F), "SPS")?;
    let Some(&num_pps) = data.get(pos) else {
        return Err(TaoError::InvalidData("H264: avcC 缺少 PPS 数量".into()));
    };
    pos += 1;
    let pps_list = read_param_sets(data, &mut pos, usize::from(num_pps), "PPS")?;
    Ok(AvccConfig {
        sps_list,
        pps_list,
        length_size,
    })
}

fn read_param_sets(
    data: &[u8],
    pos: &mut usize,
    count: usize,
    kind: &str,
) -> TaoResult<Vec<Vec<u8>>> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let Some(len) = data.get(*pos..*pos + 2) else {
            return Err(TaoError::InvalidData(format!(
                "H264: avcC {kind} 长度字段截断, index={i}"
            )));
        };
        let len = usize::from(u16::from_be_bytes([len[0], len[1]]));
        *pos += 2;
        let Some(body) = data.get(*pos..*pos + len).filter(|b| !b.is_empty()) else {
            return Err(TaoError::InvalidData(format!(
                "H264: avcC {kind} 数据非法, index={i}, len={len}"
            )));
        };
        out.push(body.to_vec());
        *pos += len;
    }
    Ok(out)
}
