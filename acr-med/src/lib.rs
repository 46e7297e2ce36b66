#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供中型 ACR MRI 体模 (Medium ACR Phantom) 质量控制的结构化分析流程.
//!
//! 该 crate 不负责 DICOM 解析与图形界面. 调用者需要将已经载入内存的 11
//! 层图像序列 ([`MrSeries`]) 交给本库, 然后依次完成:
//!
//! 1. 通过 [`context::ContextBuilder`] 检测体模边界, 确定内插件所在层面以及
//!    分辨率插件 / 圆形插件所在方位, 得到只读的 [`MedAcrContext`];
//! 2. 以该上下文驱动各个测量模块 ([`modules`]), 每个模块先放置 ROI
//!    (`draw_rois`), 再基于 ROI 统计量计算结果 (`analyse`).
//!
//! # 注意
//!
//! 1. 所有几何常量均以毫米为单位, 在使用前按照像素间距换算为像素坐标.
//! 2. 像素坐标采用 `(x, y)` 语义: `x` 向右增长 (列), `y` 向下增长 (行).
//!   底层 `ndarray` 仍以 `(h, w)` 行优先方式访问.
//! 3. 前置条件错误 (如层数不为 11, 插件方位位于同一轴) 会直接以 `Err` 返回;
//!   曲线拟合失败等可恢复错误只会使单个输出字段为空, 不影响其它输出.
//!
//! # 模块概览
//!
//! ### 剖面特征提取 ✅
//!
//! 给定一维强度剖面, 求 `max / d` 处的亚像素边界, 最宽峰, 以及阈值以上的索引集合.
//! 在此基础上计算分辨率插件的最差对比度.
//!
//! 实现位于 `acr-med/src/profile`.
//!
//! ### 斜坡拟合 ✅
//!
//! 平顶高斯和分裂高斯两种模型, 带边界约束的 Levenberg-Marquardt 最小二乘拟合.
//!
//! 实现位于 `acr-med/src/fitting`.
//!
//! ### 体模上下文 ✅
//!
//! 内插件层面选择, 插件方位分类, 以及自动/微调两种模式的上下文构建.
//!
//! 实现位于 `acr-med/src/context`.
//!
//! ### 测量模块 ✅
//!
//! 减影信噪比, 均匀度, 伪影 (鬼影), 层厚, 层面位置, 体模宽度, 分辨率/对比度.
//!
//! 实现位于 `acr-med/src/modules`.

/// 二维索引 `(h, w)`, 与 `ndarray` 的访问顺序一致.
pub type Idx2d = (usize, usize);

/// 高精度二维坐标 / 向量.
pub type Idx2dF = (f64, f64);

/// 图像序列, 切片视图与 MR 标签.
pub mod data;

pub use data::{MrSeries, MrTag, MrTags, PixelSpacing, ScanSlice};

pub mod consts;

pub mod context;

pub use context::{BoundaryContext, InsertsSlice, MedAcrContext, Side};

pub mod fitting;

pub mod modules;

pub mod profile;

pub mod roi;

pub mod prelude;
