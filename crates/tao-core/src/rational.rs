//! 有理数类型, 用于采样宽高比 (SAR) 与显示宽高比 (DAR).

use std::fmt;

/// 有理数, 由分子和分母组成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 创建新的有理数
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 未定义 (分母为 0)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 判断是否有效 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 分子分母均为正数
    pub const fn is_positive(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// 对有理数进行约分
    pub fn reduce(self) -> Self {
        if self.den == 0 {
            return self;
        }
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        if g == 0 {
            return self;
        }
        let g = g as i32;
        // 保证分母为正
        let sign = if self.den < 0 { -1 } else { 1 };
        Self {
            num: sign * self.num / g,
            den: sign * self.den / g,
        }
    }

    /// 由图像尺寸与采样宽高比计算约分后的显示宽高比
    ///
    /// SAR 无效时返回 `None`.
    pub fn display_aspect(width: u32, height: u32, sar: Self) -> Option<Self> {
        if !sar.is_positive() || width == 0 || height == 0 {
            return None;
        }
        let num = i64::from(width) * i64::from(sar.num);
        let den = i64::from(height) * i64::from(sar.den);
        let g = gcd_u64(num.unsigned_abs(), den.unsigned_abs()) as i64;
        let (num, den) = (num / g, den / g);
        if num > i64::from(i32::MAX) || den > i64::from(i32::MAX) {
            return None;
        }
        Some(Self::new(num as i32, den as i32))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self { num, den }
    }
}

/// 求最大公约数 (欧几里得算法)
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

fn gcd_u64(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
