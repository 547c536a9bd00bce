//! H.264 硬件解码协议.
//!
//! 每帧提交顺序:
//! 1. 图像参数 → Execute
//! 2. 码流 (改写后) + 条带控制 (长/短格式) + 量化矩阵 → Execute
//!
//! 显示顺序按 POC 决定: 优先使用解析器给出的下一输出 POC, 否则取最小 POC.
//! IDR 会重置 POC, 因此在 IDR 之前先排空所有已就绪图像.

pub mod bitstream;
pub mod params;
pub mod picture;
pub mod refs;

use log::{debug, trace, warn};
use tao_core::TaoResult;

use self::bitstream::H264Rewriter;
use self::params::{write_long_slices, write_pic_params, write_qmatrix, write_short_slices};
use self::picture::H264Picture;
use self::refs::RefTable;
use crate::buffers::CompressedBufferType;
use crate::codec_id::CodecId;
use crate::codecs::{BitstreamParser, CodecPictureProtocol};
use crate::decoder::{DecodeStatus, DxvaContext, FrameSelector, add_bitstream, add_bytes};
use crate::parsers::h264::parse_avcc_config;
use crate::store::{PictureEntry, PictureStore};
use crate::surface::SurfaceIndex;

/// H.264 允许积压的未显示图像数量
pub const H264_MAX_WAITING: usize = 3;

/// 按 POC 选择输出图像
#[derive(Debug, Default)]
pub struct PocSelector {
    next_output_poc: Option<i32>,
}

impl PocSelector {
    /// 记录解析器给出的下一输出 POC
    pub fn set_next_output(&mut self, poc: Option<i32>) {
        self.next_output_poc = poc;
    }
}

impl FrameSelector for PocSelector {
    fn max_waiting(&self) -> usize {
        H264_MAX_WAITING
    }

    fn find_oldest_frame(&mut self, store: &PictureStore) -> Option<SurfaceIndex> {
        if let Some(surface) = self
            .next_output_poc
            .take()
            .and_then(|poc| store.find_by_tag(poc))
        {
            return Some(surface);
        }
        store
            .pending_display()
            .min_by_key(|(_, slot)| slot.codec_tag)
            .map(|(surface, _)| surface)
    }

    fn guesses_start_time(&self) -> bool {
        true
    }
}

/// H.264 解码协议
pub struct H264Protocol {
    parser: Box<dyn BitstreamParser<Output = H264Picture>>,
    rewriter: H264Rewriter,
    refs: RefTable,
    selector: PocSelector,
    status_report: u32,
}

impl H264Protocol {
    /// 使用外部解析器创建
    pub fn new(parser: Box<dyn BitstreamParser<Output = H264Picture>>) -> Self {
        Self {
            parser,
            rewriter: H264Rewriter::annex_b(),
            refs: RefTable::new(),
            selector: PocSelector::default(),
            status_report: 0,
        }
    }

    /// 参考帧表
    pub fn refs(&self) -> &RefTable {
        &self.refs
    }

    /// 最近一次提交的 StatusReportFeedbackNumber
    pub fn status_report(&self) -> u32 {
        self.status_report
    }

    fn release_refs(ctx: &mut DxvaContext, surfaces: Vec<SurfaceIndex>) -> TaoResult<()> {
        for surface in surfaces {
            ctx.store_mut().remove_ref_frame(surface)?;
        }
        Ok(())
    }
}

impl CodecPictureProtocol for H264Protocol {
    fn codec_id(&self) -> CodecId {
        CodecId::H264
    }

    fn decode_frame(
        &mut self,
        ctx: &mut DxvaContext,
        data: &[u8],
        start: Option<i64>,
        stop: Option<i64>,
    ) -> TaoResult<DecodeStatus> {
        let Some(pic) = self.parser.parse(data)? else {
            debug!("H264: 参数集尚未就绪, 跳过访问单元");
            return Ok(DecodeStatus::NoOutput);
        };
        if ctx.is_flushed() && !pic.is_keyframe() {
            trace!("H264: 刷新后等待关键帧, 丢弃 {:?} 图像", pic.picture_type);
            return Ok(DecodeStatus::NoOutput);
        }

        let second_field = pic.field_type.is_field() && ctx.store().pending_field().is_some();
        if pic.is_idr && !second_field {
            let shown = ctx.drain(&mut self.selector)?;
            let evicted = self.refs.clear();
            Self::release_refs(ctx, evicted)?;
            trace!("H264: IDR 前排空 {} 幅图像", shown);
        }
        if let Some(sar) = pic.sample_aspect {
            ctx.set_sample_aspect(sar);
        }

        let (surface, sample) = ctx.get_free_surface()?;
        self.status_report = self.status_report.wrapping_add(1);
        let pic_params = write_pic_params(&pic, surface, &self.refs, self.status_report)?;
        let qmatrix = write_qmatrix(&pic)?;
        let long_slice = ctx.accel_config().uses_long_slice();

        let rewriter = &mut self.rewriter;
        let refs = &self.refs;
        ctx.decode_on_surface(surface, |engine| {
            add_bytes(engine, CompressedBufferType::PictureParameters, &pic_params)?;
            engine.execute()?;

            add_bitstream(engine, &mut *rewriter, data)?;
            let slices = if long_slice {
                if rewriter.slices().len() != pic.slices.len() {
                    warn!(
                        "H264: 条带数量不一致, nal={}, header={}",
                        rewriter.slices().len(),
                        pic.slices.len()
                    );
                }
                write_long_slices(rewriter.slices(), &pic.slices, refs)?
            } else {
                write_short_slices(rewriter.slices())?
            };
            add_bytes(engine, CompressedBufferType::SliceControl, &slices)?;
            add_bytes(
                engine,
                CompressedBufferType::InverseQuantizationMatrix,
                &qmatrix,
            )?;
            engine.execute()
        })?;

        if pic.is_reference() {
            let evicted = self.refs.mark_decoded(&pic, surface);
            Self::release_refs(ctx, evicted)?;
        }
        self.selector.set_next_output(pic.output_poc);
        ctx.add_to_store(PictureEntry {
            surface,
            sample,
            is_reference: pic.is_reference(),
            start,
            stop,
            field_type: pic.field_type,
            picture_type: pic.picture_type,
            codec_tag: pic.poc(),
        })?;
        ctx.display_next_frame(&mut self.selector, false)?;
        ctx.set_decoding();
        Ok(DecodeStatus::Decoded)
    }

    fn set_extra_data(&mut self, _ctx: &mut DxvaContext, data: &[u8]) -> TaoResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        // avcC 以 configurationVersion = 1 开头, Annex B 以起始码开头
        if data[0] == 1 {
            let config = parse_avcc_config(data)?;
            debug!(
                "H264: avcC 扩展数据, length_size={}, sps={}, pps={}",
                config.length_size,
                config.sps_list.len(),
                config.pps_list.len()
            );
            self.rewriter.set_nal_length_size(Some(config.length_size));
        } else {
            self.rewriter.set_nal_length_size(None);
        }
        self.parser.set_extra_data(data)
    }

    fn drain(&mut self, ctx: &mut DxvaContext) -> TaoResult<usize> {
        ctx.drain(&mut self.selector)
    }

    fn flush(&mut self) {
        self.refs = RefTable::new();
        self.selector = PocSelector::default();
        self.parser.reset();
    }
}
