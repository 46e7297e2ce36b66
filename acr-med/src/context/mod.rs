//! 中型 ACR 体模上下文.
//!
//! 上下文描述了体模在图像中的外边界, 内插件所在的层面,
//! 以及分辨率插件与圆形插件各自位于体模的哪一侧. 所有测量模块都以它为输入.
//!
//! 上下文由 [`ContextBuilder`] 构建, 一经构建即为只读.

use thiserror::Error;

mod builder;
mod classify;
mod detector;
mod side;

pub use builder::{detect_inserts_slice, ContextBuilder, InsertsSelection, CONTEXT_MODULE};
pub use classify::{classify_sides, SideClassification};
pub use detector::{BoundaryDetector, DetectMode, ThresholdDetector};
pub use side::{Axis, Side};

use crate::consts::{ACR_SLICE_COUNT, FIRST_SLICE, LAST_SLICE};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 上下文构建错误.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ContextError {
    /// 序列层数不为 11.
    #[error("期望 {expected} 层的 ACR 序列, 实际为 {got} 层")]
    SliceCount {
        /// 期望层数.
        expected: usize,
        /// 实际层数.
        got: usize,
    },

    /// 分辨率插件与圆形插件位于同一条轴上.
    #[error("分辨率插件 ({res}) 与圆形插件 ({circle}) 不能位于同一条轴上")]
    SameAxis {
        /// 分辨率插件方位.
        res: Side,
        /// 圆形插件方位.
        circle: Side,
    },

    /// 外边界检测失败.
    #[error("体模边界检测失败: {0}")]
    Detector(String),

    /// 方位采样盒与图像没有交集.
    #[error("采样盒 {0} 落在图像之外")]
    EmptyBox(&'static str),
}

/// 上下文构建结果.
pub type ContextResult<T> = Result<T, ContextError>;

/// 体模外边界, 像素坐标 (闭区间).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundaryContext {
    /// 左边界.
    pub xmin: f64,
    /// 右边界.
    pub xmax: f64,
    /// 上边界.
    pub ymin: f64,
    /// 下边界.
    pub ymax: f64,
}

impl BoundaryContext {
    /// 由四个边界构造.
    #[inline]
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    /// 中心列坐标.
    #[inline]
    pub fn xcent(&self) -> f64 {
        (self.xmin + self.xmax) / 2.0
    }

    /// 中心行坐标.
    #[inline]
    pub fn ycent(&self) -> f64 {
        (self.ymin + self.ymax) / 2.0
    }

    /// 水平方向跨度 (像素).
    #[inline]
    pub fn x_length(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// 垂直方向跨度 (像素).
    #[inline]
    pub fn y_length(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// 内插件所在层面: 第一层或最后一层.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InsertsSlice {
    /// 第 1 层 (索引 0).
    First,
    /// 第 11 层 (索引 10).
    Last,
}

impl InsertsSlice {
    /// 层面索引.
    #[inline]
    pub const fn index(&self) -> usize {
        match self {
            Self::First => FIRST_SLICE,
            Self::Last => LAST_SLICE,
        }
    }

    /// 另一端的层面.
    #[inline]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::First => Self::Last,
            Self::Last => Self::First,
        }
    }

    /// 由层面索引构造, 仅接受 0 与 10.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            FIRST_SLICE => Some(Self::First),
            LAST_SLICE => Some(Self::Last),
            _ => None,
        }
    }
}

/// 中型 ACR 体模上下文. 只能通过 [`MedAcrContext::new`] 或 [`ContextBuilder`] 构造,
/// 保证分辨率插件与圆形插件位于正交的两条轴上.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct MedAcrContext {
    boundary: BoundaryContext,
    inserts_slice: InsertsSlice,
    res_side: Side,
    circle_side: Side,
}

impl MedAcrContext {
    /// 构造上下文. 两个插件位于同一条轴上时返回错误.
    pub fn new(
        boundary: BoundaryContext,
        inserts_slice: InsertsSlice,
        res_side: Side,
        circle_side: Side,
    ) -> ContextResult<Self> {
        if !res_side.is_orthogonal_to(circle_side) {
            return Err(ContextError::SameAxis {
                res: res_side,
                circle: circle_side,
            });
        }
        Ok(Self {
            boundary,
            inserts_slice,
            res_side,
            circle_side,
        })
    }

    /// 体模外边界.
    #[inline]
    pub fn boundary(&self) -> &BoundaryContext {
        &self.boundary
    }

    /// 内插件所在层面.
    #[inline]
    pub fn inserts_slice(&self) -> InsertsSlice {
        self.inserts_slice
    }

    /// 分辨率插件方位.
    #[inline]
    pub fn res_side(&self) -> Side {
        self.res_side
    }

    /// 圆形插件方位.
    #[inline]
    pub fn circle_side(&self) -> Side {
        self.circle_side
    }

    /// 均匀体模层面, 用于均匀度, 伪影与信噪比.
    ///
    /// 内插件位于最后一层时为第 5 层 (索引 4), 否则为第 7 层 (索引 6).
    #[inline]
    pub fn uniform_slice(&self) -> usize {
        match self.inserts_slice {
            InsertsSlice::Last => 4,
            InsertsSlice::First => 6,
        }
    }

    /// 几何测量层面, 用于体模宽度. 与 [`Self::uniform_slice`] 关于中心层对称.
    #[inline]
    pub fn geometry_slice(&self) -> usize {
        ACR_SLICE_COUNT - 1 - self.uniform_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary() -> BoundaryContext {
        BoundaryContext::new(40.0, 200.0, 30.0, 190.0)
    }

    #[test]
    fn test_orthogonality_invariant() {
        let mut ok = 0;
        for res in Side::ALL {
            for circle in Side::ALL {
                match MedAcrContext::new(boundary(), InsertsSlice::First, res, circle) {
                    Ok(ctx) => {
                        assert_ne!(ctx.res_side().axis(), ctx.circle_side().axis());
                        ok += 1;
                    }
                    Err(e) => assert_eq!(e, ContextError::SameAxis { res, circle }),
                }
            }
        }
        assert_eq!(ok, 8);
    }

    #[test]
    fn test_boundary_derived() {
        let b = boundary();
        assert_eq!(b.xcent(), 120.0);
        assert_eq!(b.ycent(), 110.0);
        assert_eq!(b.x_length(), 160.0);
        assert_eq!(b.y_length(), 160.0);
    }

    #[test]
    fn test_working_slices() {
        let first = MedAcrContext::new(boundary(), InsertsSlice::First, Side::Top, Side::Left).unwrap();
        assert_eq!((first.uniform_slice(), first.geometry_slice()), (6, 4));
        let last = MedAcrContext::new(boundary(), InsertsSlice::Last, Side::Top, Side::Left).unwrap();
        assert_eq!((last.uniform_slice(), last.geometry_slice()), (4, 6));
        assert_eq!(InsertsSlice::from_index(10), Some(InsertsSlice::Last));
        assert_eq!(InsertsSlice::from_index(5), None);
        assert_eq!(InsertsSlice::First.opposite().index(), 10);
    }
}
