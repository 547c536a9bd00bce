//! 硬件解码器上下文与对外接口.
//!
//! `DxvaContext` 汇集一个解码器实例的全部共享状态: 加速引擎、图像存储区、
//! 下游接收者与实例配置. 各编解码器的逐帧协议 (`CodecPictureProtocol`)
//! 通过它提交缓冲区、存储图像并调度显示.
//!
//! 解码器状态机:
//!
//! ```text
//! Flushed ──(帧内图像)──▶ Decoding ──(flush)──▶ Flushed
//! ```
//!
//! Flushed 状态下的非帧内图像直接丢弃, 不触碰存储区.

use log::{debug, trace, warn};
use tao_core::{Rational, TaoError, TaoResult};

use crate::buffers::{AccelConfig, CompressedBufferType};
use crate::codec_id::{CodecId, DecoderMode};
use crate::codecs::CodecPictureProtocol;
use crate::engine::{AccelEngine, EngineKind, copy_into};
use crate::retry::RetryPolicy;
use crate::sample::{DisplayInfo, OutputSample, SampleFlags};
use crate::sink::DownstreamSink;
use crate::store::{PictureEntry, PictureStore};
use crate::surface::SurfaceIndex;

/// 解码器实例配置
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    /// 图像宽度
    pub width: u32,
    /// 图像高度
    pub height: u32,
    /// 解码表面数量
    pub surface_count: usize,
    /// 平均帧时长 (100ns)
    pub avg_time_per_frame: i64,
    /// VC-1 是否通过时间戳延迟交换重排 B 帧
    pub reorder_b_frames: bool,
    /// 是否跟随码流更新显示宽高比
    pub update_aspect_ratio: bool,
    /// 硬件忙等重试策略
    pub retry: RetryPolicy,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            surface_count: 22,
            avg_time_per_frame: 400_000,
            reorder_b_frames: true,
            update_aspect_ratio: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// 单次解码调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// 图像已解码并存入存储区
    Decoded,
    /// 本次调用没有输出 (刷新后等待关键帧, 参数尚未就绪, 跳过帧等)
    NoOutput,
    /// 下游正在停止, 安静结束
    NotCommitted,
}

/// 显示调度策略
pub trait FrameSelector {
    /// 允许积压的未显示图像数量上限
    fn max_waiting(&self) -> usize;

    /// 在未显示图像中选出下一幅要显示的图像
    fn find_oldest_frame(&mut self, store: &PictureStore) -> Option<SurfaceIndex>;

    /// 缺失开始时间时是否由上一帧结束时间推算
    fn guesses_start_time(&self) -> bool {
        false
    }
}

/// 解码器共享状态
pub struct DxvaContext {
    engine: Box<dyn AccelEngine>,
    store: PictureStore,
    sink: Box<dyn DownstreamSink>,
    config: DecoderConfig,
    accel_config: AccelConfig,
    mode: DecoderMode,
    flushed: bool,
    last_stop: Option<i64>,
    display_aspect: Option<Rational>,
    pending_aspect: Option<Rational>,
}

impl DxvaContext {
    /// 创建上下文并初始化加速引擎
    pub fn new(
        mode: DecoderMode,
        mut engine: Box<dyn AccelEngine>,
        sink: Box<dyn DownstreamSink>,
        config: DecoderConfig,
    ) -> TaoResult<Self> {
        if config.surface_count == 0 || config.surface_count > usize::from(u16::MAX) {
            return Err(TaoError::InvalidArgument(format!(
                "DXVA: 表面数量非法, surface_count={}",
                config.surface_count
            )));
        }
        let accel_config = engine.init(mode, config.surface_count)?;
        Ok(Self {
            engine,
            store: PictureStore::new(config.surface_count),
            sink,
            config,
            accel_config,
            mode,
            flushed: true,
            last_stop: None,
            display_aspect: None,
            pending_aspect: None,
        })
    }

    /// 实例配置
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// 协商得到的加速配置
    pub fn accel_config(&self) -> AccelConfig {
        self.accel_config
    }

    /// 解码模式
    pub fn mode(&self) -> DecoderMode {
        self.mode
    }

    /// 引擎类型
    pub fn engine_kind(&self) -> EngineKind {
        self.engine.kind()
    }

    /// 图像存储区
    pub fn store(&self) -> &PictureStore {
        &self.store
    }

    /// 图像存储区 (可写)
    pub fn store_mut(&mut self) -> &mut PictureStore {
        &mut self.store
    }

    /// 是否处于刷新后等待关键帧的状态
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// 进入正常解码状态
    pub fn set_decoding(&mut self) {
        self.flushed = false;
    }

    /// 当前显示宽高比
    pub fn display_aspect(&self) -> Option<Rational> {
        self.display_aspect
    }

    /// 获取一个可写入的表面
    pub fn get_free_surface(&mut self) -> TaoResult<(SurfaceIndex, Option<OutputSample>)> {
        let (width, height) = (self.config.width, self.config.height);
        self.engine
            .get_free_surface(&mut self.store, self.sink.as_mut(), width, height)
    }

    /// 在 begin_frame/end_frame 之间执行 `submit`.
    ///
    /// `submit` 出错时仍尝试结束本帧, 然后返回原错误.
    pub fn decode_on_surface(
        &mut self,
        surface: SurfaceIndex,
        submit: impl FnOnce(&mut dyn AccelEngine) -> TaoResult<()>,
    ) -> TaoResult<()> {
        self.engine.begin_frame(surface)?;
        if let Err(err) = submit(self.engine.as_mut()) {
            if let Err(end_err) = self.engine.end_frame(surface) {
                warn!("DXVA: 出错后结束帧失败, surface={}, err={}", surface, end_err);
            }
            return Err(err);
        }
        self.engine.end_frame(surface)
    }

    /// 存入图像, 返回是否形成完整的可显示单元
    pub fn add_to_store(&mut self, entry: PictureEntry) -> TaoResult<bool> {
        self.store.add_to_store(entry)
    }

    /// 记录码流给出的样本宽高比
    pub fn set_sample_aspect(&mut self, sar: Rational) {
        if !self.config.update_aspect_ratio {
            return;
        }
        let dar = Rational::display_aspect(self.config.width, self.config.height, sar);
        if dar.is_some() && dar != self.display_aspect {
            debug!(
                "DXVA: 显示宽高比变化, sar={}, dar={:?}",
                sar, dar
            );
            self.display_aspect = dar;
            self.pending_aspect = dar;
        }
    }

    /// 选择并显示下一幅图像, 返回是否有图像被选中.
    ///
    /// `force` 为 true 时忽略积压上限 (排空).
    pub fn display_next_frame(
        &mut self,
        selector: &mut dyn FrameSelector,
        force: bool,
    ) -> TaoResult<bool> {
        let waiting = self.store.waiting();
        if waiting == 0 || (!force && waiting <= selector.max_waiting()) {
            return Ok(false);
        }
        let Some(surface) = selector.find_oldest_frame(&self.store) else {
            return Ok(false);
        };
        let Some(slot) = self.store.slot(surface) else {
            return Err(TaoError::Internal(format!(
                "DXVA: 调度选中不存在的表面 {}",
                surface
            )));
        };

        let avg = self.config.avg_time_per_frame;
        let (mut start, mut stop) = (slot.start, slot.stop);
        if start.is_none() && selector.guesses_start_time() {
            if let Some(last) = self.last_stop {
                start = Some(last);
                stop = Some(last + avg);
            }
        }
        let flags = SampleFlags::for_picture(slot.field_type, slot.picture_type);
        let picture_type = slot.picture_type;

        let delivered = match start.filter(|s| *s >= 0) {
            Some(s) => {
                let info = DisplayInfo {
                    width: self.config.width,
                    height: self.config.height,
                    start,
                    stop,
                    flags,
                    picture_type,
                    display_aspect: self.pending_aspect.take(),
                };
                trace!(
                    "DXVA: 显示 surface={}, start={}, type={:?}",
                    surface, s, picture_type
                );
                self.last_stop = Some(stop.unwrap_or(s + avg));
                // 表面解码完成后才能输出
                self.engine.query_status(surface).and_then(|()| {
                    self.engine
                        .deliver_frame(&mut self.store, self.sink.as_mut(), surface, &info)
                })
            }
            None => {
                debug!("DXVA: 图像没有有效开始时间, 不交付, surface={}", surface);
                Ok(())
            }
        };
        self.store.mark_displayed(surface)?;
        delivered?;
        Ok(true)
    }

    /// 显示全部已就绪图像
    pub fn drain(&mut self, selector: &mut dyn FrameSelector) -> TaoResult<usize> {
        let mut count = 0;
        while self.display_next_frame(selector, true)? {
            count += 1;
        }
        Ok(count)
    }

    /// 重置存储区与引擎, 进入 Flushed 状态
    pub fn flush(&mut self) {
        self.store.flush();
        self.engine.flush();
        self.flushed = true;
        self.last_stop = None;
    }
}

/// 按开始时间选最早图像的基础调度策略
#[derive(Debug, Clone, Copy)]
pub struct OldestStartSelector {
    /// 积压上限
    pub max_waiting: usize,
}

impl FrameSelector for OldestStartSelector {
    fn max_waiting(&self) -> usize {
        self.max_waiting
    }

    fn find_oldest_frame(&mut self, store: &PictureStore) -> Option<SurfaceIndex> {
        store.oldest_by_start_time()
    }
}

/// 码流改写钩子: 把一个访问单元写入硬件码流缓冲区, 返回写入字节数
pub trait BitstreamRewriter {
    /// 改写并拷贝码流
    fn copy_bitstream(&mut self, dst: &mut [u8], src: &[u8]) -> TaoResult<usize>;
}

/// 原样拷贝
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCopy;

impl BitstreamRewriter for RawCopy {
    fn copy_bitstream(&mut self, dst: &mut [u8], src: &[u8]) -> TaoResult<usize> {
        copy_into(dst, src)
    }
}

/// 提交一个固定内容的缓冲区
pub fn add_bytes(
    engine: &mut dyn AccelEngine,
    buffer_type: CompressedBufferType,
    data: &[u8],
) -> TaoResult<()> {
    engine.add_execute_buffer(buffer_type, &mut |dst: &mut [u8]| copy_into(dst, data))
}

/// 经改写钩子提交码流缓冲区, 返回写入的字节数
pub fn add_bitstream(
    engine: &mut dyn AccelEngine,
    rewriter: &mut dyn BitstreamRewriter,
    data: &[u8],
) -> TaoResult<usize> {
    let mut written = 0;
    engine.add_execute_buffer(CompressedBufferType::Bitstream, &mut |dst: &mut [u8]| {
        written = rewriter.copy_bitstream(dst, data)?;
        Ok(written)
    })?;
    Ok(written)
}

/// 硬件加速解码器
pub struct DxvaDecoder {
    ctx: DxvaContext,
    codec: Box<dyn CodecPictureProtocol>,
}

impl DxvaDecoder {
    /// 创建解码器; 未知编解码器或加速器不支持的模式在此直接失败
    pub fn new(
        engine: Box<dyn AccelEngine>,
        sink: Box<dyn DownstreamSink>,
        config: DecoderConfig,
        codec: Box<dyn CodecPictureProtocol>,
    ) -> TaoResult<Self> {
        let mode = DecoderMode::for_codec(codec.codec_id())?;
        let ctx = DxvaContext::new(mode, engine, sink, config)?;
        debug!(
            "DXVA: 创建解码器, codec={}, mode={}, engine={}",
            codec.codec_id(),
            mode,
            ctx.engine_kind()
        );
        Ok(Self { ctx, codec })
    }

    /// 解码一个访问单元.
    ///
    /// 表面耗尽时整个解码器刷新 (存储区, 参考窗口, 调度状态), 并返回 `NoFreeSurface`.
    pub fn decode_frame(
        &mut self,
        data: &[u8],
        start: Option<i64>,
        stop: Option<i64>,
    ) -> TaoResult<DecodeStatus> {
        match self.codec.decode_frame(&mut self.ctx, data, start, stop) {
            Err(TaoError::NotCommitted) => {
                debug!("DXVA: 下游未提交, 忽略本帧");
                Ok(DecodeStatus::NotCommitted)
            }
            Err(TaoError::NoFreeSurface) => {
                warn!("DXVA: 没有空闲表面, 刷新解码器");
                self.flush();
                Err(TaoError::NoFreeSurface)
            }
            other => other,
        }
    }

    /// 设置编解码器扩展数据 (avcC / 序列头)
    pub fn set_extra_data(&mut self, data: &[u8]) -> TaoResult<()> {
        self.codec.set_extra_data(&mut self.ctx, data)
    }

    /// 显示全部已就绪图像, 返回显示数量
    pub fn drain(&mut self) -> TaoResult<usize> {
        match self.codec.drain(&mut self.ctx) {
            Err(TaoError::NotCommitted) => Ok(0),
            other => other,
        }
    }

    /// 刷新解码器, 释放全部表面与参考
    pub fn flush(&mut self) {
        self.codec.flush();
        self.ctx.flush();
    }

    /// 编解码器标识
    pub fn codec_id(&self) -> CodecId {
        self.codec.codec_id()
    }

    /// 解码模式
    pub fn mode(&self) -> DecoderMode {
        self.ctx.mode()
    }

    /// 引擎类型
    pub fn engine_kind(&self) -> EngineKind {
        self.ctx.engine_kind()
    }

    /// 解码器上下文
    pub fn context(&self) -> &DxvaContext {
        &self.ctx
    }
}
