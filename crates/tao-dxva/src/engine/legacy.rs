//! 旧式加速引擎 (DXVA1).
//!
//! 表面按整数索引寻址, 压缩缓冲区按 (类型索引, 缓冲区编号) 获取.
//! 每帧开始时挑选一个渲染状态空闲的缓冲区编号, 本帧所有类型共用该编号.

use std::sync::Arc;

use log::{debug, warn};
use tao_core::{TaoError, TaoResult};

use super::{AccelEngine, EngineKind, FillFn, HwError, HwResult, hw_call};
use crate::buffers::{AccelConfig, BufferDescription, CompBufferInfo, CompressedBufferType};
use crate::codec_id::DecoderMode;
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::sample::{DisplayInfo, OutputSample};
use crate::sink::DownstreamSink;
use crate::store::PictureStore;
use crate::surface::SurfaceIndex;

/// Execute 的解码功能号
pub const DXVA_DECODE_FUNCTION: u32 = 0x0100_0000;

/// 查询未压缩表面状态时使用的类型索引
pub const SURFACE_TYPE_INDEX: u32 = u32::MAX;

/// 旧式加速器接口
pub trait LegacyAccelerator: Send {
    /// 是否支持指定解码模式
    fn supports_mode(&self, mode: DecoderMode) -> bool;

    /// 协商配置: 提交建议配置, 返回加速器接受的配置
    fn negotiate_config(
        &mut self,
        mode: DecoderMode,
        proposed: &AccelConfig,
    ) -> HwResult<AccelConfig>;

    /// 锁定配置
    fn lock_config(&mut self, mode: DecoderMode, config: &AccelConfig) -> HwResult<()>;

    /// 按类型索引返回的压缩缓冲区信息
    fn comp_buffer_info(&mut self, mode: DecoderMode) -> HwResult<Vec<CompBufferInfo>>;

    /// 创建解码表面
    fn create_surfaces(&mut self, count: usize) -> HwResult<()>;

    /// 开始一帧
    fn begin_frame(&mut self, surface: SurfaceIndex) -> HwResult<()>;

    /// 查询缓冲区或表面 (`SURFACE_TYPE_INDEX`) 的渲染状态
    fn query_render_status(&mut self, type_index: u32, buffer_index: u32) -> HwResult<()>;

    /// 获取可写入的压缩缓冲区
    fn get_buffer(&mut self, type_index: u32, buffer_index: u32) -> HwResult<&mut [u8]>;

    /// 释放压缩缓冲区
    fn release_buffer(&mut self, type_index: u32, buffer_index: u32) -> HwResult<()>;

    /// 提交缓冲区
    fn execute(&mut self, function: u32, buffers: &[BufferDescription]) -> HwResult<()>;

    /// 结束一帧
    fn end_frame(&mut self, surface: SurfaceIndex) -> HwResult<()>;

    /// 把表面内容输出到下游样本
    fn display_frame(&mut self, surface: SurfaceIndex, sample: &mut OutputSample)
    -> HwResult<()>;
}

/// 旧式引擎
pub struct LegacyEngine {
    accel: Box<dyn LegacyAccelerator>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    config: AccelConfig,
    buffer_info: Vec<CompBufferInfo>,
    buffer_index: u32,
    submitted: Vec<BufferDescription>,
}

impl LegacyEngine {
    /// 创建旧式引擎
    pub fn new(accel: Box<dyn LegacyAccelerator>, retry: RetryPolicy) -> Self {
        Self {
            accel,
            retry,
            sleeper: Arc::new(ThreadSleeper),
            config: AccelConfig::default(),
            buffer_info: Vec::new(),
            buffer_index: 0,
            submitted: Vec::new(),
        }
    }

    /// 替换休眠实现
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn buffer_count(&self, type_index: u32) -> u32 {
        self.buffer_info
            .get(type_index as usize)
            .map(|info| info.count)
            .unwrap_or(1)
            .max(1)
    }

    /// 找一个渲染状态空闲的图像参数缓冲区编号
    fn find_free_buffer_index(&mut self) -> TaoResult<u32> {
        let type_index = CompressedBufferType::PictureParameters.legacy_type_index();
        let count = self.buffer_count(type_index);
        let accel = &mut self.accel;
        self.retry
            .run(self.sleeper.as_ref(), "query_render_status", || {
                for index in 0..count {
                    match accel.query_render_status(type_index, index) {
                        Ok(()) => return Ok(index),
                        Err(HwError::Pending) => continue,
                        Err(err) => return Err(err),
                    }
                }
                Err(HwError::Pending)
            })
    }

    fn release_submitted(&mut self) {
        for desc in self.submitted.drain(..) {
            let type_index = desc.buffer_type.legacy_type_index();
            if let Err(err) = self.accel.release_buffer(type_index, desc.buffer_index) {
                warn!(
                    "DXVA: 释放缓冲区失败, type={}, index={}, err={}",
                    desc.buffer_type, desc.buffer_index, err
                );
            }
        }
    }
}

impl AccelEngine for LegacyEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Legacy
    }

    fn init(&mut self, mode: DecoderMode, surface_count: usize) -> TaoResult<AccelConfig> {
        if !self.accel.supports_mode(mode) {
            return Err(TaoError::Unsupported(format!(
                "DXVA: 加速器不支持解码模式 {}",
                mode
            )));
        }
        let proposed = AccelConfig::default();
        let accepted = hw_call("negotiate_config", self.accel.negotiate_config(mode, &proposed))?;
        hw_call("lock_config", self.accel.lock_config(mode, &accepted))?;
        self.buffer_info = hw_call("comp_buffer_info", self.accel.comp_buffer_info(mode))?;
        hw_call("create_surfaces", self.accel.create_surfaces(surface_count))?;
        self.config = accepted;
        debug!(
            "DXVA: {} 初始化完成, mode={}, surfaces={}, bitstream_raw={}",
            self.kind(),
            mode,
            surface_count,
            accepted.bitstream_raw
        );
        Ok(accepted)
    }

    fn config(&self) -> AccelConfig {
        self.config
    }

    fn flush(&mut self) {
        self.release_submitted();
    }

    fn begin_frame(&mut self, surface: SurfaceIndex) -> TaoResult<()> {
        // 上一帧出错时残留的缓冲区
        self.release_submitted();
        let accel = &mut self.accel;
        self.retry
            .run(self.sleeper.as_ref(), "begin_frame", || accel.begin_frame(surface))?;
        match self.find_free_buffer_index() {
            Ok(index) => {
                self.buffer_index = index;
                Ok(())
            }
            Err(err) => {
                if let Err(end_err) = self.accel.end_frame(surface) {
                    warn!("DXVA: 结束帧失败, surface={}, err={}", surface, end_err);
                }
                Err(err)
            }
        }
    }

    fn add_execute_buffer(
        &mut self,
        buffer_type: CompressedBufferType,
        fill: FillFn<'_>,
    ) -> TaoResult<()> {
        let type_index = buffer_type.legacy_type_index();
        let buffer_index = self.buffer_index;
        let accel = &mut self.accel;
        let written = self.retry.run(self.sleeper.as_ref(), "get_buffer", || {
            accel.get_buffer(type_index, buffer_index).map(|dst| fill(dst))
        })?;
        let written = match written {
            Ok(n) => n,
            Err(err) => {
                // 写入失败的缓冲区不会进入提交列表, 立即归还
                if let Err(release_err) = self.accel.release_buffer(type_index, buffer_index) {
                    warn!(
                        "DXVA: 释放缓冲区失败, type={}, index={}, err={}",
                        buffer_type, buffer_index, release_err
                    );
                }
                return Err(err);
            }
        };
        self.submitted.push(BufferDescription {
            buffer_type,
            buffer_index,
            data_size: written as u32,
        });
        Ok(())
    }

    fn execute(&mut self) -> TaoResult<()> {
        let result = self.accel.execute(DXVA_DECODE_FUNCTION, &self.submitted);
        self.release_submitted();
        hw_call("execute", result)
    }

    fn end_frame(&mut self, surface: SurfaceIndex) -> TaoResult<()> {
        hw_call("end_frame", self.accel.end_frame(surface))
    }

    fn query_status(&mut self, surface: SurfaceIndex) -> TaoResult<()> {
        let accel = &mut self.accel;
        self.retry.run(self.sleeper.as_ref(), "query_status", || {
            accel.query_render_status(SURFACE_TYPE_INDEX, u32::from(surface.raw()))
        })
    }

    fn get_free_surface(
        &mut self,
        store: &mut PictureStore,
        _sink: &mut dyn DownstreamSink,
        _width: u32,
        _height: u32,
    ) -> TaoResult<(SurfaceIndex, Option<OutputSample>)> {
        store
            .free_surface_index()
            .map(|surface| (surface, None))
            .ok_or(TaoError::NoFreeSurface)
    }

    fn deliver_frame(
        &mut self,
        _store: &mut PictureStore,
        sink: &mut dyn DownstreamSink,
        surface: SurfaceIndex,
        info: &DisplayInfo,
    ) -> TaoResult<()> {
        let mut sample = sink.get_delivery_buffer(info.width, info.height)?;
        info.apply(&mut sample);
        hw_call("display_frame", self.accel.display_frame(surface, &mut sample))?;
        sink.deliver(sample)
    }
}
