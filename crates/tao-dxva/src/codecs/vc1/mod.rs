//! VC-1 / WMV3 硬件解码协议.
//!
//! 每帧在一次 Execute 中提交图像参数、码流与单条带信息.
//! 开启 B 帧重排时, 参考图像的时间戳延迟一帧:
//! B 图像与延迟值交换时间戳, 下一个参考图像到来时再把延迟值写回上一个参考图像.

pub mod bitstream;
pub mod extradata;
pub mod params;
pub mod picture;

use std::mem;

use log::{debug, trace};
use tao_core::TaoResult;

use self::bitstream::Vc1Rewriter;
use self::extradata::parse_extra_data;
use self::params::{build_picture_params, build_slice_info};
use self::picture::{Vc1Picture, Vc1Profile, Vc1SequenceInfo};
use crate::buffers::CompressedBufferType;
use crate::codec_id::CodecId;
use crate::codecs::ref_window::RefWindow;
use crate::codecs::{BitstreamParser, CodecPictureProtocol};
use crate::decoder::{DecodeStatus, DxvaContext, OldestStartSelector, add_bitstream, add_bytes};
use crate::store::PictureEntry;
use crate::surface::SurfaceIndex;

/// VC-1 允许积压的未显示图像数量
pub const VC1_MAX_WAITING: usize = 5;

/// 延迟中的参考图像时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DelayedTimestamps {
    surface: Option<SurfaceIndex>,
    start: Option<i64>,
    stop: Option<i64>,
}

impl Default for DelayedTimestamps {
    fn default() -> Self {
        Self {
            surface: None,
            start: Some(i64::MAX),
            stop: Some(i64::MAX),
        }
    }
}

/// VC-1 解码协议
pub struct Vc1Protocol {
    codec: CodecId,
    parser: Box<dyn BitstreamParser<Output = Vc1Picture>>,
    rewriter: Vc1Rewriter,
    sequence: Vc1SequenceInfo,
    refs: RefWindow,
    selector: OldestStartSelector,
    scan_method: u8,
    delayed: DelayedTimestamps,
}

impl Vc1Protocol {
    /// 高级档次 (WVC1)
    pub fn vc1(parser: Box<dyn BitstreamParser<Output = Vc1Picture>>) -> Self {
        Self::with_codec(CodecId::Vc1, Vc1Profile::Advanced, parser)
    }

    /// 简单/主档次 (WMV3)
    pub fn wmv3(parser: Box<dyn BitstreamParser<Output = Vc1Picture>>) -> Self {
        Self::with_codec(CodecId::Wmv3, Vc1Profile::Main, parser)
    }

    fn with_codec(
        codec: CodecId,
        profile: Vc1Profile,
        parser: Box<dyn BitstreamParser<Output = Vc1Picture>>,
    ) -> Self {
        Self {
            codec,
            parser,
            rewriter: Vc1Rewriter::new(codec),
            sequence: Vc1SequenceInfo {
                profile,
                ..Vc1SequenceInfo::default()
            },
            refs: RefWindow::default(),
            selector: OldestStartSelector {
                max_waiting: VC1_MAX_WAITING,
            },
            scan_method: 0,
            delayed: DelayedTimestamps::default(),
        }
    }

    /// 序列信息
    pub fn sequence(&self) -> &Vc1SequenceInfo {
        &self.sequence
    }

    /// 参考窗口
    pub fn refs(&self) -> &RefWindow {
        &self.refs
    }

    /// 最近一次提交的 bPicScanMethod (状态报告计数)
    pub fn scan_method(&self) -> u8 {
        self.scan_method
    }

    /// 按 B 帧重排规则调整本帧时间戳
    fn reorder_timestamps(
        &mut self,
        ctx: &mut DxvaContext,
        pic: &Vc1Picture,
        surface: SurfaceIndex,
        start: &mut Option<i64>,
        stop: &mut Option<i64>,
    ) -> TaoResult<()> {
        if pic.is_backward_predicted() {
            mem::swap(start, &mut self.delayed.start);
            mem::swap(stop, &mut self.delayed.stop);
            return Ok(());
        }
        if ctx.is_flushed() {
            return Ok(());
        }
        if let Some(prev) = self.delayed.surface {
            ctx.store_mut()
                .update_store(prev, self.delayed.start, self.delayed.stop)?;
        }
        self.delayed = DelayedTimestamps {
            surface: Some(surface),
            ..DelayedTimestamps::default()
        };
        mem::swap(start, &mut self.delayed.start);
        mem::swap(stop, &mut self.delayed.stop);
        Ok(())
    }

    /// 把延迟的时间戳写回最后一个参考图像
    fn release_delayed(&mut self, ctx: &mut DxvaContext) -> TaoResult<()> {
        let delayed = mem::take(&mut self.delayed);
        if let Some(surface) = delayed.surface {
            ctx.store_mut()
                .update_store(surface, delayed.start, delayed.stop)?;
        }
        Ok(())
    }
}

impl CodecPictureProtocol for Vc1Protocol {
    fn codec_id(&self) -> CodecId {
        self.codec
    }

    fn decode_frame(
        &mut self,
        ctx: &mut DxvaContext,
        data: &[u8],
        start: Option<i64>,
        stop: Option<i64>,
    ) -> TaoResult<DecodeStatus> {
        let Some(pic) = self.parser.parse(data)? else {
            debug!("VC1: 序列头尚未就绪, 跳过本帧");
            return Ok(DecodeStatus::NoOutput);
        };
        if pic.skipped {
            trace!("VC1: 跳过帧, 不提交硬件");
            return Ok(DecodeStatus::NoOutput);
        }
        if ctx.is_flushed() && !pic.is_intra() {
            trace!("VC1: 刷新后等待帧内图像, 丢弃 {:?}", pic.picture_type);
            return Ok(DecodeStatus::NoOutput);
        }

        let (surface, sample) = ctx.get_free_surface()?;
        self.scan_method = self.scan_method.wrapping_add(1);
        let size = (ctx.config().width, ctx.config().height);
        let pp = build_picture_params(
            &pic,
            &self.sequence,
            ctx.accel_config(),
            surface,
            &self.refs,
            size,
            self.scan_method,
        );
        let pp_bytes = pp.to_bytes()?;

        let rewriter = &mut self.rewriter;
        ctx.decode_on_surface(surface, |engine| {
            add_bytes(engine, CompressedBufferType::PictureParameters, &pp_bytes)?;
            let written = add_bitstream(engine, &mut *rewriter, data)?;
            let mb_bit_offset = pic.header_bits.saturating_add(rewriter.start_code_bits());
            let slice = build_slice_info(&pp, written, mb_bit_offset)?;
            add_bytes(engine, CompressedBufferType::SliceControl, &slice)?;
            engine.execute()
        })?;

        let (mut start, mut stop) = (start, stop);
        if ctx.config().reorder_b_frames && !pic.second_field {
            self.reorder_timestamps(ctx, &pic, surface, &mut start, &mut stop)?;
        }
        let evicted = if pic.is_reference() && !pic.second_field {
            self.refs.advance(surface)
        } else {
            None
        };

        ctx.add_to_store(PictureEntry {
            surface,
            sample,
            is_reference: pic.is_reference(),
            start,
            stop,
            field_type: pic.field_type,
            picture_type: pic.picture_type,
            codec_tag: 0,
        })?;
        if let Some(old) = evicted {
            ctx.store_mut().remove_ref_frame(old)?;
        }
        ctx.display_next_frame(&mut self.selector, false)?;
        ctx.set_decoding();
        Ok(DecodeStatus::Decoded)
    }

    fn set_extra_data(&mut self, ctx: &mut DxvaContext, data: &[u8]) -> TaoResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.sequence = parse_extra_data(data)?;
        if let Some(sar) = self.sequence.sample_aspect {
            ctx.set_sample_aspect(sar);
        }
        self.parser.set_extra_data(data)
    }

    fn drain(&mut self, ctx: &mut DxvaContext) -> TaoResult<usize> {
        self.release_delayed(ctx)?;
        ctx.drain(&mut self.selector)
    }

    fn flush(&mut self) {
        self.refs = RefWindow::default();
        self.delayed = DelayedTimestamps::default();
        self.parser.reset();
    }
}
