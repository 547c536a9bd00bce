//! # tao-core
//!
//! Tao 硬件解码框架核心库, 提供错误类型、有理数与比特流读取等基础设施.

pub mod bitreader;
pub mod error;
pub mod rational;

// 重导出常用类型
pub use error::{TaoError, TaoResult};
pub use rational::Rational;
