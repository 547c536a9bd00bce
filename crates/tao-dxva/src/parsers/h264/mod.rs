//! H.264 码流拆分.

pub mod nal;

pub use nal::{AvccConfig, NalUnit, NalUnitType, parse_avcc_config, split_annex_b, split_avcc};
