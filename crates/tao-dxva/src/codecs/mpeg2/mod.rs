//! MPEG-2 硬件解码协议.
//!
//! 显示顺序不比较时间戳, 而是维护"下一幅应显示图像的解码顺序编号"队列:
//! 解析器给出提示时直接使用; 否则 B 图像立即可显示, I/P 图像到来时上一个参考图像可显示.

pub mod bitstream;
pub mod params;
pub mod picture;

use std::collections::VecDeque;

use log::{debug, trace};
use tao_core::TaoResult;

use self::bitstream::Mpeg2Rewriter;
use self::params::{build_picture_params, build_slice_infos};
use self::picture::Mpeg2Picture;
use crate::buffers::CompressedBufferType;
use crate::codec_id::CodecId;
use crate::codecs::picture_params::write_qmatrix_data;
use crate::codecs::ref_window::RefWindow;
use crate::codecs::{BitstreamParser, CodecPictureProtocol};
use crate::decoder::{DecodeStatus, DxvaContext, FrameSelector, add_bitstream, add_bytes};
use crate::sample::PictureType;
use crate::store::{PictureEntry, PictureStore};
use crate::surface::SurfaceIndex;

/// MPEG-2 允许积压的未显示图像数量
pub const MPEG2_MAX_WAITING: usize = 5;

/// 按解码顺序编号选择输出图像
#[derive(Debug, Default)]
pub struct CodedIndexSelector {
    queue: VecDeque<i32>,
    last_reference: Option<i32>,
}

impl CodedIndexSelector {
    /// 记录新解码的图像
    pub fn on_decoded(&mut self, pic: &Mpeg2Picture) {
        if let Some(next) = pic.next_output {
            self.queue.push_back(next);
        } else if pic.picture_type == PictureType::B {
            self.queue.push_back(pic.coded_index);
        } else if let Some(prev) = self.last_reference.replace(pic.coded_index) {
            self.queue.push_back(prev);
        }
    }

    /// 码流结束: 最后一个参考图像可以显示
    pub fn finish(&mut self) {
        if let Some(prev) = self.last_reference.take() {
            self.queue.push_back(prev);
        }
    }

    /// 待显示编号
    pub fn pending(&self) -> impl Iterator<Item = i32> + '_ {
        self.queue.iter().copied()
    }
}

impl FrameSelector for CodedIndexSelector {
    fn max_waiting(&self) -> usize {
        MPEG2_MAX_WAITING
    }

    fn find_oldest_frame(&mut self, store: &PictureStore) -> Option<SurfaceIndex> {
        while let Some(next) = self.queue.pop_front() {
            if let Some(surface) = store.find_by_tag(next) {
                return Some(surface);
            }
            trace!("MPEG2: 编号 {} 已不在存储区, 跳过", next);
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

/// MPEG-2 解码协议
pub struct Mpeg2Protocol {
    parser: Box<dyn BitstreamParser<Output = Mpeg2Picture>>,
    rewriter: Mpeg2Rewriter,
    refs: RefWindow,
    selector: CodedIndexSelector,
}

impl Mpeg2Protocol {
    /// 使用外部解析器创建
    pub fn new(parser: Box<dyn BitstreamParser<Output = Mpeg2Picture>>) -> Self {
        Self {
            parser,
            rewriter: Mpeg2Rewriter::default(),
            refs: RefWindow::default(),
            selector: CodedIndexSelector::default(),
        }
    }

    /// 参考窗口
    pub fn refs(&self) -> &RefWindow {
        &self.refs
    }

    /// 显示调度状态
    pub fn selector(&self) -> &CodedIndexSelector {
        &self.selector
    }
}

impl CodecPictureProtocol for Mpeg2Protocol {
    fn codec_id(&self) -> CodecId {
        CodecId::Mpeg2Video
    }

    fn decode_frame(
        &mut self,
        ctx: &mut DxvaContext,
        data: &[u8],
        start: Option<i64>,
        stop: Option<i64>,
    ) -> TaoResult<DecodeStatus> {
        let Some(pic) = self.parser.parse(data)? else {
            debug!("MPEG2: 序列头尚未就绪, 跳过图像");
            return Ok(DecodeStatus::NoOutput);
        };
        if ctx.is_flushed() && !pic.is_keyframe() {
            trace!("MPEG2: 刷新后等待 I 帧, 丢弃 {:?}", pic.picture_type);
            return Ok(DecodeStatus::NoOutput);
        }
        if let Some(sar) = pic.sample_aspect {
            ctx.set_sample_aspect(sar);
        }

        let (surface, sample) = ctx.get_free_surface()?;
        let (width, height) = (ctx.config().width, ctx.config().height);
        let pp = build_picture_params(&pic, surface, &self.refs, width, height);
        let pp_bytes = pp.to_bytes()?;
        let qmatrix = write_qmatrix_data(&pic.quant_matrices)?;

        let rewriter = &mut self.rewriter;
        ctx.decode_on_surface(surface, |engine| {
            add_bytes(engine, CompressedBufferType::PictureParameters, &pp_bytes)?;
            add_bytes(
                engine,
                CompressedBufferType::InverseQuantizationMatrix,
                &qmatrix,
            )?;
            add_bitstream(engine, &mut *rewriter, data)?;
            let slices = build_slice_infos(&pp, rewriter.slices(), &pic.slices)?;
            add_bytes(engine, CompressedBufferType::SliceControl, &slices)?;
            engine.execute()
        })?;

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
            codec_tag: pic.coded_index,
        })?;
        if let Some(old) = evicted {
            ctx.store_mut().remove_ref_frame(old)?;
        }
        if !pic.second_field {
            self.selector.on_decoded(&pic);
        }
        ctx.display_next_frame(&mut self.selector, false)?;
        ctx.set_decoding();
        Ok(DecodeStatus::Decoded)
    }

    fn set_extra_data(&mut self, _ctx: &mut DxvaContext, data: &[u8]) -> TaoResult<()> {
        self.parser.set_extra_data(data)
    }

    fn drain(&mut self, ctx: &mut DxvaContext) -> TaoResult<usize> {
        self.selector.finish();
        ctx.drain(&mut self.selector)
    }

    fn flush(&mut self) {
        self.refs = RefWindow::default();
        self.selector = CodedIndexSelector::default();
        self.parser.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(selector: &mut CodedIndexSelector, types: &[PictureType]) {
        for (i, &t) in types.iter().enumerate() {
            selector.on_decoded(&Mpeg2Picture::new(t, i as i32));
        }
    }

    #[test]
    fn test_解码顺序到显示顺序() {
        use PictureType::{B, I, P};
        let mut selector = CodedIndexSelector::default();
        // 解码顺序 I0 P1 B2 B3 P4 B5, 显示顺序 I0 B2 B3 P1 B5 P4
        feed(&mut selector, &[I, P, B, B, P, B]);
        selector.finish();
        assert_eq!(selector.pending().collect::<Vec<_>>(), vec![0, 2, 3, 1, 5, 4]);
    }

    #[test]
    fn test_解析器提示优先() {
        let mut selector = CodedIndexSelector::default();
        let mut pic = Mpeg2Picture::new(PictureType::P, 3);
        pic.next_output = Some(7);
        selector.on_decoded(&pic);
        assert_eq!(selector.pending().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn test_跳过已不存在的编号() {
        let mut store = PictureStore::new(4);
        store
            .add_to_store(PictureEntry {
                codec_tag: 9,
                ..PictureEntry::frame(SurfaceIndex::new(2), PictureType::I)
            })
            .unwrap();
        let mut selector = CodedIndexSelector::default();
        selector.queue.extend([4, 9]);
        assert_eq!(selector.find_oldest_frame(&store), Some(SurfaceIndex::new(2)));
        assert_eq!(selector.pending().count(), 0);
    }
}
