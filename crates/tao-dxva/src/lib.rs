//! # tao-dxva
//!
//! Tao 硬件加速视频解码的图像管理引擎.
//!
//! 管理固定数量的硬件解码表面, 在两代加速接口 (索引式 DXVA1 与服务式 DXVA2) 之间
//! 分派逐帧解码请求, 并在解码顺序与显示顺序之间重排 (B 帧), 同时跟踪参考图像的
//! 生命周期, 保证仍被引用的表面不会被复用.
//!
//! ## 组成
//!
//! - [`PictureStore`]: 表面槽位数组与显示调度
//! - [`AccelEngine`]: 加速引擎抽象, 实现为 [`LegacyEngine`] 与 [`ModernEngine`]
//! - [`CodecPictureProtocol`]: H.264 / VC-1 / MPEG-2 逐帧协议
//! - [`DxvaDecoder`]: 对外解码接口
//!
//! ## 示例
//!
//! ```rust
//! use tao_dxva::{PictureEntry, PictureStore, PictureType};
//!
//! let mut store = PictureStore::new(4);
//! let surface = store.free_surface_index().unwrap();
//! store
//!     .add_to_store(PictureEntry::frame(surface, PictureType::I))
//!     .unwrap();
//! assert_eq!(store.waiting(), 1);
//! ```

pub mod buffers;
pub mod codec_id;
pub mod codecs;
pub mod decoder;
pub mod engine;
pub mod parsers;
pub mod retry;
pub mod sample;
pub mod sink;
pub mod store;
pub mod surface;

// 重导出常用类型
pub use buffers::{AccelConfig, BufferDescription, CompBufferInfo, CompressedBufferType};
pub use codec_id::{CodecId, DecoderMode};
pub use codecs::h264::H264Protocol;
pub use codecs::mpeg2::Mpeg2Protocol;
pub use codecs::vc1::Vc1Protocol;
pub use codecs::{BitstreamParser, CodecPictureProtocol};
pub use decoder::{DecodeStatus, DecoderConfig, DxvaContext, DxvaDecoder, FrameSelector};
pub use engine::{
    AccelEngine, EngineKind, HwError, HwResult, LegacyAccelerator, LegacyEngine,
    ModernAccelerator, ModernEngine,
};
pub use retry::{CountingSleeper, RetryPolicy, Sleeper, ThreadSleeper};
pub use sample::{DisplayInfo, FieldType, OutputSample, PictureType, SampleFlags};
pub use sink::{DownstreamSink, QueueSink};
pub use store::{PictureEntry, PictureSlot, PictureStore};
pub use surface::{NO_REF_FRAME, SurfaceIndex};
