//! 集成测试共用的脚本化加速器, 解析器与接收者.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tao_core::TaoResult;
use tao_dxva::codecs::BitstreamParser;
use tao_dxva::{
    AccelConfig, BufferDescription, CompBufferInfo, CompressedBufferType, DecoderConfig,
    DecoderMode, DownstreamSink, HwError, HwResult, LegacyAccelerator, ModernAccelerator,
    OutputSample, QueueSink, RetryPolicy, SurfaceIndex,
};

/// 每个硬件缓冲区的容量
pub const BUFFER_SIZE: usize = 64 * 1024;

/// 旧式接口每种类型的缓冲区个数
pub const LEGACY_BUFFERS_PER_TYPE: u32 = 2;

/// 加速器调用记录, 由测试与加速器共享
#[derive(Debug, Default)]
pub struct AccelLog {
    pub begun: Vec<SurfaceIndex>,
    pub ended: Vec<SurfaceIndex>,
    pub executes: Vec<Vec<BufferDescription>>,
    /// 旧式为 (类型索引, 缓冲区编号), 新式编号恒为 0
    pub released: Vec<(u32, u32)>,
    pub displayed: Vec<SurfaceIndex>,
    pub begin_calls: u32,
    /// begin_frame 还需返回 pending 的次数
    pub begin_pending: u32,
    /// execute 固定返回的错误码
    pub execute_error: Option<i32>,
    /// get_buffer 固定返回 pending
    pub buffer_pending: bool,
    /// query_render_status 固定返回 pending
    pub render_pending: bool,
}

pub type SharedLog = Arc<Mutex<AccelLog>>;

/// 安装测试日志输出, 可重复调用
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 快速重试的测试配置
pub fn test_config(width: u32, height: u32, surface_count: usize) -> DecoderConfig {
    init_logging();
    DecoderConfig {
        width,
        height,
        surface_count,
        retry: RetryPolicy {
            max_attempts: 4,
            delay: Duration::from_millis(1),
        },
        ..DecoderConfig::default()
    }
}

fn begin(log: &SharedLog, surface: SurfaceIndex) -> HwResult<()> {
    let mut log = log.lock().unwrap();
    log.begin_calls += 1;
    if log.begin_pending > 0 {
        log.begin_pending -= 1;
        return Err(HwError::Pending);
    }
    log.begun.push(surface);
    Ok(())
}

fn execute(log: &SharedLog, buffers: &[BufferDescription]) -> HwResult<()> {
    let mut log = log.lock().unwrap();
    log.executes.push(buffers.to_vec());
    match log.execute_error {
        Some(code) => Err(HwError::Failed(code)),
        None => Ok(()),
    }
}

/// 脚本化的旧式加速器
pub struct ScriptedLegacy {
    log: SharedLog,
    buffers: Vec<Vec<u8>>,
}

impl ScriptedLegacy {
    pub fn new() -> (Self, SharedLog) {
        let log = SharedLog::default();
        let count = CompressedBufferType::LEGACY_TYPE_COUNT * LEGACY_BUFFERS_PER_TYPE as usize;
        let accel = Self {
            log: Arc::clone(&log),
            buffers: vec![vec![0; BUFFER_SIZE]; count],
        };
        (accel, log)
    }
}

impl LegacyAccelerator for ScriptedLegacy {
    fn supports_mode(&self, _mode: DecoderMode) -> bool {
        true
    }

    fn negotiate_config(
        &mut self,
        _mode: DecoderMode,
        proposed: &AccelConfig,
    ) -> HwResult<AccelConfig> {
        Ok(*proposed)
    }

    fn lock_config(&mut self, _mode: DecoderMode, _config: &AccelConfig) -> HwResult<()> {
        Ok(())
    }

    fn comp_buffer_info(&mut self, _mode: DecoderMode) -> HwResult<Vec<CompBufferInfo>> {
        Ok(vec![
            CompBufferInfo {
                count: LEGACY_BUFFERS_PER_TYPE,
                size: BUFFER_SIZE as u32,
            };
            CompressedBufferType::LEGACY_TYPE_COUNT
        ])
    }

    fn create_surfaces(&mut self, _count: usize) -> HwResult<()> {
        Ok(())
    }

    fn begin_frame(&mut self, surface: SurfaceIndex) -> HwResult<()> {
        begin(&self.log, surface)
    }

    fn query_render_status(&mut self, _type_index: u32, _buffer_index: u32) -> HwResult<()> {
        if self.log.lock().unwrap().render_pending {
            return Err(HwError::Pending);
        }
        Ok(())
    }

    fn get_buffer(&mut self, type_index: u32, buffer_index: u32) -> HwResult<&mut [u8]> {
        let slot = (type_index * LEGACY_BUFFERS_PER_TYPE + buffer_index) as usize;
        self.buffers
            .get_mut(slot)
            .map(Vec::as_mut_slice)
            .ok_or(HwError::Failed(-1))
    }

    fn release_buffer(&mut self, type_index: u32, buffer_index: u32) -> HwResult<()> {
        self.log.lock().unwrap().released.push((type_index, buffer_index));
        Ok(())
    }

    fn execute(&mut self, _function: u32, buffers: &[BufferDescription]) -> HwResult<()> {
        execute(&self.log, buffers)
    }

    fn end_frame(&mut self, surface: SurfaceIndex) -> HwResult<()> {
        self.log.lock().unwrap().ended.push(surface);
        Ok(())
    }

    fn display_frame(&mut self, surface: SurfaceIndex, _sample: &mut OutputSample) -> HwResult<()> {
        self.log.lock().unwrap().displayed.push(surface);
        Ok(())
    }
}

/// 脚本化的新式加速器
pub struct ScriptedModern {
    log: SharedLog,
    buffers: Vec<Vec<u8>>,
    current: Option<SurfaceIndex>,
}

impl ScriptedModern {
    pub fn new() -> (Self, SharedLog) {
        let log = SharedLog::default();
        let accel = Self {
            log: Arc::clone(&log),
            buffers: vec![vec![0; BUFFER_SIZE]; CompressedBufferType::LEGACY_TYPE_COUNT],
            current: None,
        };
        (accel, log)
    }
}

impl ModernAccelerator for ScriptedModern {
    fn supports_mode(&self, _mode: DecoderMode) -> bool {
        true
    }

    fn create_decoder(
        &mut self,
        _mode: DecoderMode,
        _surface_count: usize,
    ) -> HwResult<AccelConfig> {
        Ok(AccelConfig::default())
    }

    fn begin_frame(&mut self, surface: SurfaceIndex) -> HwResult<()> {
        begin(&self.log, surface)?;
        self.current = Some(surface);
        Ok(())
    }

    fn get_buffer(&mut self, buffer_type: u32) -> HwResult<&mut [u8]> {
        if self.log.lock().unwrap().buffer_pending {
            return Err(HwError::Pending);
        }
        self.buffers
            .get_mut(buffer_type as usize)
            .map(Vec::as_mut_slice)
            .ok_or(HwError::Failed(-1))
    }

    fn release_buffer(&mut self, buffer_type: u32) -> HwResult<()> {
        self.log.lock().unwrap().released.push((buffer_type, 0));
        Ok(())
    }

    fn execute(&mut self, buffers: &[BufferDescription]) -> HwResult<()> {
        execute(&self.log, buffers)
    }

    fn end_frame(&mut self) -> HwResult<()> {
        if let Some(surface) = self.current.take() {
            self.log.lock().unwrap().ended.push(surface);
        }
        Ok(())
    }
}

/// 按顺序返回预置解析结果的解析器
pub struct ScriptedParser<T> {
    pictures: Arc<Mutex<VecDeque<T>>>,
    resets: Arc<Mutex<u32>>,
}

impl<T> ScriptedParser<T> {
    pub fn new(pictures: Vec<T>) -> Self {
        Self {
            pictures: Arc::new(Mutex::new(pictures.into())),
            resets: Arc::default(),
        }
    }

    /// 预置队列句柄, 可在解码过程中追加
    pub fn queue(&self) -> Arc<Mutex<VecDeque<T>>> {
        Arc::clone(&self.pictures)
    }

    /// reset 调用计数句柄
    pub fn resets(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.resets)
    }
}

impl<T: Send> BitstreamParser for ScriptedParser<T> {
    type Output = T;

    fn parse(&mut self, _data: &[u8]) -> TaoResult<Option<T>> {
        Ok(self.pictures.lock().unwrap().pop_front())
    }

    fn reset(&mut self) {
        *self.resets.lock().unwrap() += 1;
    }
}

/// 可在测试中观察的共享接收者
#[derive(Clone)]
pub struct SharedSink(pub Arc<Mutex<QueueSink>>);

impl SharedSink {
    pub fn new(surface_count: u16) -> Self {
        Self(Arc::new(Mutex::new(QueueSink::new(surface_count))))
    }

    pub fn delivered(&self) -> Vec<OutputSample> {
        self.0.lock().unwrap().drain_delivered()
    }

    pub fn set_committed(&self, committed: bool) {
        self.0.lock().unwrap().set_committed(committed);
    }
}

impl DownstreamSink for SharedSink {
    fn get_delivery_buffer(&mut self, width: u32, height: u32) -> TaoResult<OutputSample> {
        self.0.lock().unwrap().get_delivery_buffer(width, height)
    }

    fn deliver(&mut self, sample: OutputSample) -> TaoResult<()> {
        self.0.lock().unwrap().deliver(sample)
    }
}

/// 条带 NAL 访问单元
pub fn h264_access_unit(idr: bool) -> Vec<u8> {
    let nal_header = if idr { 0x65 } else { 0x41 };
    vec![0x00, 0x00, 0x00, 0x01, nal_header, 0x88, 0x84, 0x21, 0x40]
}

/// 含图像头与一个条带的 MPEG-2 访问单元
pub fn mpeg2_access_unit() -> Vec<u8> {
    vec![
        0x00, 0x00, 0x01, 0x00, 0x00, 0x0F, // 图像头
        0x00, 0x00, 0x01, 0x01, 0x12, 0x34, 0x56, // 条带
    ]
}
