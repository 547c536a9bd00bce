//! 新式加速引擎 (DXVA2).
//!
//! 表面由下游分配器随样本一起提供, 引擎从样本读出绑定的表面索引,
//! 不需要扫描存储区. 压缩缓冲区按类型获取, 写完立即归还.

use std::sync::Arc;

use log::{debug, warn};
use tao_core::{TaoError, TaoResult};

use super::{AccelEngine, EngineKind, FillFn, HwResult, hw_call};
use crate::buffers::{AccelConfig, BufferDescription, CompressedBufferType};
use crate::codec_id::DecoderMode;
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::sample::{DisplayInfo, OutputSample};
use crate::sink::DownstreamSink;
use crate::store::PictureStore;
use crate::surface::SurfaceIndex;

/// 新式加速器 (视频解码服务) 接口
pub trait ModernAccelerator: Send {
    /// 是否支持指定解码模式
    fn supports_mode(&self, mode: DecoderMode) -> bool;

    /// 创建解码器并返回其解码配置
    fn create_decoder(&mut self, mode: DecoderMode, surface_count: usize)
    -> HwResult<AccelConfig>;

    /// 开始一帧
    fn begin_frame(&mut self, surface: SurfaceIndex) -> HwResult<()>;

    /// 获取指定类型的压缩缓冲区
    fn get_buffer(&mut self, buffer_type: u32) -> HwResult<&mut [u8]>;

    /// 归还压缩缓冲区
    fn release_buffer(&mut self, buffer_type: u32) -> HwResult<()>;

    /// 提交缓冲区
    fn execute(&mut self, buffers: &[BufferDescription]) -> HwResult<()>;

    /// 结束一帧
    fn end_frame(&mut self) -> HwResult<()>;
}

/// 新式引擎
pub struct ModernEngine {
    accel: Box<dyn ModernAccelerator>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    config: AccelConfig,
    buffers: Vec<BufferDescription>,
}

impl ModernEngine {
    /// 创建新式引擎
    pub fn new(accel: Box<dyn ModernAccelerator>, retry: RetryPolicy) -> Self {
        Self {
            accel,
            retry,
            sleeper: Arc::new(ThreadSleeper),
            config: AccelConfig::default(),
            buffers: Vec::new(),
        }
    }

    /// 替换休眠实现
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }
}

impl AccelEngine for ModernEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Modern
    }

    fn init(&mut self, mode: DecoderMode, surface_count: usize) -> TaoResult<AccelConfig> {
        if !self.accel.supports_mode(mode) {
            return Err(TaoError::Unsupported(format!(
                "DXVA: 解码服务不支持解码模式 {}",
                mode
            )));
        }
        self.config = hw_call(
            "create_decoder",
            self.accel.create_decoder(mode, surface_count),
        )?;
        debug!(
            "DXVA: {} 初始化完成, mode={}, surfaces={}, bitstream_raw={}",
            self.kind(),
            mode,
            surface_count,
            self.config.bitstream_raw
        );
        Ok(self.config)
    }

    fn config(&self) -> AccelConfig {
        self.config
    }

    fn flush(&mut self) {
        self.buffers.clear();
    }

    fn begin_frame(&mut self, surface: SurfaceIndex) -> TaoResult<()> {
        self.buffers.clear();
        let accel = &mut self.accel;
        self.retry
            .run(self.sleeper.as_ref(), "begin_frame", || accel.begin_frame(surface))
    }

    fn add_execute_buffer(
        &mut self,
        buffer_type: CompressedBufferType,
        fill: FillFn<'_>,
    ) -> TaoResult<()> {
        let type_id = buffer_type.modern_type();
        let accel = &mut self.accel;
        let written = self.retry.run(self.sleeper.as_ref(), "get_buffer", || {
            accel.get_buffer(type_id).map(|dst| fill(dst))
        })?;
        let released = self.accel.release_buffer(type_id);
        let written = written?;
        hw_call("release_buffer", released)?;
        self.buffers.push(BufferDescription {
            buffer_type,
            buffer_index: 0,
            data_size: written as u32,
        });
        Ok(())
    }

    fn execute(&mut self) -> TaoResult<()> {
        let result = self.accel.execute(&self.buffers);
        self.buffers.clear();
        hw_call("execute", result)
    }

    fn end_frame(&mut self, _surface: SurfaceIndex) -> TaoResult<()> {
        hw_call("end_frame", self.accel.end_frame())
    }

    fn query_status(&mut self, _surface: SurfaceIndex) -> TaoResult<()> {
        Ok(())
    }

    fn get_free_surface(
        &mut self,
        store: &mut PictureStore,
        sink: &mut dyn DownstreamSink,
        width: u32,
        height: u32,
    ) -> TaoResult<(SurfaceIndex, Option<OutputSample>)> {
        if let Some(pending) = store.pending_field() {
            return Ok((pending, None));
        }
        let sample = sink.get_delivery_buffer(width, height)?;
        let surface = sample
            .surface()
            .ok_or_else(|| TaoError::Internal("DXVA: 分配器样本未绑定表面".into()))?;
        match store.slot(surface) {
            None => Err(TaoError::InvalidArgument(format!(
                "DXVA: 样本表面越界, surface={}, count={}",
                surface,
                store.len()
            ))),
            Some(slot) if slot.in_use => {
                warn!("DXVA: 分配器返回仍在使用的表面, surface={}", surface);
                Err(TaoError::Internal(format!(
                    "DXVA: 表面 {} 仍被存储区占用",
                    surface
                )))
            }
            Some(_) => Ok((surface, Some(sample))),
        }
    }

    fn deliver_frame(
        &mut self,
        store: &mut PictureStore,
        sink: &mut dyn DownstreamSink,
        surface: SurfaceIndex,
        info: &DisplayInfo,
    ) -> TaoResult<()> {
        // 参考帧继续由存储区持有一份, 防止分配器提前复用
        let keep = store.slot(surface).is_some_and(|slot| slot.is_reference);
        let sample = if keep {
            store.slot(surface).and_then(|slot| slot.sample.clone())
        } else {
            store.take_sample(surface)
        };
        let mut sample = sample.ok_or_else(|| {
            TaoError::Internal(format!("DXVA: 表面 {} 没有可交付的样本", surface))
        })?;
        info.apply(&mut sample);
        sink.deliver(sample)
    }
}
