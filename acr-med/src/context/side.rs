use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 图像平面内的轴.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    /// 水平方向 (列, `x`).
    Horizontal,
    /// 垂直方向 (行, `y`).
    Vertical,
}

impl Axis {
    /// 与之正交的轴.
    #[inline]
    pub const fn orthogonal(&self) -> Self {
        match self {
            Self::Horizontal => Self::Vertical,
            Self::Vertical => Self::Horizontal,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Horizontal => "Horizontal",
            Self::Vertical => "Vertical",
        })
    }
}

/// 体模在图像中的四个方位. 上下沿垂直轴, 左右沿水平轴.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Side {
    /// 上方 (`y` 较小).
    Top,
    /// 下方 (`y` 较大).
    Bottom,
    /// 左侧 (`x` 较小).
    Left,
    /// 右侧 (`x` 较大).
    Right,
}

impl Side {
    /// 全部四个方位, 顺序与插件方位分类时的采样盒顺序一致.
    pub const ALL: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

    /// 所在的轴.
    #[inline]
    pub const fn axis(&self) -> Axis {
        match self {
            Self::Top | Self::Bottom => Axis::Vertical,
            Self::Left | Self::Right => Axis::Horizontal,
        }
    }

    /// 对侧.
    #[inline]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// 该方位沿所在轴的符号: 上/左为 `-1`, 下/右为 `+1`.
    #[inline]
    pub const fn sign(&self) -> i64 {
        match self {
            Self::Top | Self::Left => -1,
            Self::Bottom | Self::Right => 1,
        }
    }

    /// 两个方位是否位于正交的两条轴上.
    #[inline]
    pub fn is_orthogonal_to(&self, other: Side) -> bool {
        self.axis() != other.axis()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Top => "Top",
            Self::Bottom => "Bottom",
            Self::Left => "Left",
            Self::Right => "Right",
        })
    }
}
