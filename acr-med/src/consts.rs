//! 通用常量.
//!
//! 这里只保存与中型 ACR 体模序列本身相关的常量.
//! 各测量模块使用的几何常量 (毫米) 保存在对应模块内部.

/// 中型 ACR 体模序列的层数.
pub const ACR_SLICE_COUNT: usize = 11;

/// z 轴剖面最小值位于该索引时, 内插件位于第一层.
pub const INSERTS_FIRST_MARKER: usize = 4;

/// 第一层的索引.
pub const FIRST_SLICE: usize = 0;

/// 最后一层的索引.
pub const LAST_SLICE: usize = ACR_SLICE_COUNT - 1;

/// 中型 ACR 体模的标称直径 (单位: 毫米).
pub const NOMINAL_PHANTOM_WIDTH: f64 = 165.0;

/// `cos(pi / 4)`, 同时也是 `sin(pi / 4)`.
pub const COS_SIN_PI_4: f64 = std::f64::consts::FRAC_1_SQRT_2;
