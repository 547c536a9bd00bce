//! 码流预处理.

pub mod h264;
