//! MR 相关的 DICOM 标签.
//!
//! 标签以原始字符串形式保存, 读取时再解析. 标签缺失或无法解析时一律返回 `None`,
//! 由调用方决定回退值.

use std::collections::HashMap;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 本库会用到的 MR 标签.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MrTag {
    /// (0018,0095) 像素带宽, 单位 Hz/pixel.
    PixelBandwidth,

    /// (0018,0083) 激励 (平均) 次数.
    NumberOfAverages,

    /// (0018,0089) 相位编码步数.
    NumberOfPhaseEncodingSteps,

    /// (0018,1312) 平面内相位编码方向, `ROW` 或 `COL`.
    InPlanePhaseEncodingDirection,

    /// (0028,0010) 行数.
    Rows,

    /// (0028,0011) 列数.
    Columns,

    /// (0018,0093) 采样百分比.
    PercentSampling,
}

impl MrTag {
    /// DICOM 关键字.
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::PixelBandwidth => "PixelBandwidth",
            Self::NumberOfAverages => "NumberOfAverages",
            Self::NumberOfPhaseEncodingSteps => "NumberOfPhaseEncodingSteps",
            Self::InPlanePhaseEncodingDirection => "InPlanePhaseEncodingDirection",
            Self::Rows => "Rows",
            Self::Columns => "Columns",
            Self::PercentSampling => "PercentSampling",
        }
    }
}

/// 平面内相位编码方向.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PhaseEncodeDirection {
    /// 沿行 (水平方向) 编码.
    Row,

    /// 沿列 (垂直方向) 编码.
    Column,
}

/// MR 标签集合.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MrTags {
    raw: HashMap<MrTag, String>,
}

impl MrTags {
    /// 创建空集合.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置一个标签的原始值, 返回 `self` 以便链式调用.
    pub fn with(mut self, tag: MrTag, value: impl Into<String>) -> Self {
        self.insert(tag, value);
        self
    }

    /// 设置一个标签的原始值. 若已存在则覆盖.
    #[inline]
    pub fn insert(&mut self, tag: MrTag, value: impl Into<String>) {
        self.raw.insert(tag, value.into());
    }

    /// 获取标签原始值.
    #[inline]
    pub fn raw(&self, tag: MrTag) -> Option<&str> {
        self.raw.get(&tag).map(|s| s.as_str())
    }

    /// 将标签解析为 `T`. 缺失或解析失败时返回 `None`.
    ///
    /// DICOM 多值以 `\` 分隔, 这里只取第一个值.
    pub fn parse<T: FromStr>(&self, tag: MrTag) -> Option<T> {
        let first = self.raw(tag)?.split('\\').next()?;
        first.trim().parse().ok()
    }

    /// 像素带宽 (Hz/pixel).
    #[inline]
    pub fn pixel_bandwidth(&self) -> Option<f64> {
        self.parse::<f64>(MrTag::PixelBandwidth)
            .filter(|v| v.is_finite() && *v > 0.0)
    }

    /// 平均次数.
    #[inline]
    pub fn averages(&self) -> Option<f64> {
        self.parse::<f64>(MrTag::NumberOfAverages)
            .filter(|v| v.is_finite() && *v > 0.0)
    }

    /// 相位编码步数.
    #[inline]
    pub fn phase_encode_steps(&self) -> Option<f64> {
        self.parse::<f64>(MrTag::NumberOfPhaseEncodingSteps)
            .filter(|v| v.is_finite() && *v > 0.0)
    }

    /// 平面内相位编码方向.
    pub fn phase_encode_direction(&self) -> Option<PhaseEncodeDirection> {
        match self
            .raw(MrTag::InPlanePhaseEncodingDirection)?
            .trim()
            .to_ascii_uppercase()
            .as_str()
        {
            "ROW" => Some(PhaseEncodeDirection::Row),
            "COL" | "COLUMN" => Some(PhaseEncodeDirection::Column),
            _ => None,
        }
    }

    /// 图像行数.
    #[inline]
    pub fn rows(&self) -> Option<u32> {
        self.parse(MrTag::Rows)
    }

    /// 图像列数.
    #[inline]
    pub fn columns(&self) -> Option<u32> {
        self.parse(MrTag::Columns)
    }

    /// 采样百分比.
    #[inline]
    pub fn percent_sampling(&self) -> Option<f64> {
        self.parse(MrTag::PercentSampling)
    }
}

#[cfg(test)]
mod tests {
    use super::{MrTag, MrTags, PhaseEncodeDirection};

    #[test]
    fn test_tags_missing_or_invalid() {
        let tags = MrTags::new()
            .with(MrTag::PixelBandwidth, "abc")
            .with(MrTag::NumberOfAverages, "-1")
            .with(MrTag::InPlanePhaseEncodingDirection, "diag");
        assert_eq!(tags.pixel_bandwidth(), None);
        assert_eq!(tags.averages(), None);
        assert_eq!(tags.phase_encode_steps(), None);
        assert_eq!(tags.phase_encode_direction(), None);
        assert_eq!(tags.rows(), None);
    }

    #[test]
    fn test_tags_parse() {
        let tags = MrTags::new()
            .with(MrTag::PixelBandwidth, " 130.0 ")
            .with(MrTag::NumberOfAverages, "2\\1")
            .with(MrTag::NumberOfPhaseEncodingSteps, "256")
            .with(MrTag::InPlanePhaseEncodingDirection, "row")
            .with(MrTag::Rows, "256");
        assert_eq!(tags.pixel_bandwidth(), Some(130.0));
        assert_eq!(tags.averages(), Some(2.0));
        assert_eq!(tags.phase_encode_steps(), Some(256.0));
        assert_eq!(tags.phase_encode_direction(), Some(PhaseEncodeDirection::Row));
        assert_eq!(tags.rows(), Some(256));
        assert_eq!(MrTag::Rows.keyword(), "Rows");
    }
}
