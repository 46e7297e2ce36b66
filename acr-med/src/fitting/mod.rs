//! 斜坡剖面的曲线拟合.
//!
//! 给定一条斜坡 (ramp) 强度剖面, 以采样点下标为自变量, 用非线性最小二乘拟合出
//! 一条平顶曲线, 然后由拟合参数解析地求出在 `max / divisor` 处的全宽.
//!
//! 初值与边界由 [`RampModel::setup`] 给出, 可以在不运行拟合的情况下单独检查.

use ndarray::ArrayView1;

mod error;
mod flat_top;
mod lm;
mod split_gauss;

pub use error::{FitError, FitResult};

use lm::{Curve, LevenbergMarquardt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 斜坡模型类型.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RampModel {
    /// 平顶高斯, 参数 `(c, sigma, a, p, b)`.
    #[default]
    FlatTopGauss,

    /// 分裂高斯, 参数 `(c1, c2, sigma, a, b)`.
    SplitGauss,
}

/// 参数的上下界 (闭区间).
#[derive(Clone, Debug, PartialEq)]
pub struct FitBounds {
    /// 下界.
    pub lower: Vec<f64>,
    /// 上界.
    pub upper: Vec<f64>,
}

impl FitBounds {
    /// `n` 个参数均无约束.
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; n],
            upper: vec![f64::INFINITY; n],
        }
    }

    /// 将参数投影到可行域内.
    pub fn project(&self, params: &[f64]) -> Vec<f64> {
        params
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&p, (&lo, &hi))| p.max(lo).min(hi))
            .collect()
    }
}

/// 一次拟合的初值与边界.
#[derive(Clone, Debug, PartialEq)]
pub struct FitSetup {
    /// 初始参数.
    pub init: Vec<f64>,
    /// 参数边界.
    pub bounds: FitBounds,
}

/// 斜坡拟合结果.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RampFit {
    /// 使用的模型.
    pub model: RampModel,
    /// 拟合参数, 顺序见 [`RampModel`].
    pub params: Vec<f64>,
    /// 在 `max / divisor` 处的全宽, 以采样点为单位.
    pub width: f64,
}

/// 剖面的最小值与最大值.
fn min_max(profile: ArrayView1<f64>) -> (f64, f64) {
    profile
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

impl RampModel {
    /// 模型参数个数.
    pub const fn n_params(&self) -> usize {
        5
    }

    /// 模型求值.
    #[inline]
    pub fn eval(&self, params: &[f64], x: f64) -> f64 {
        Curve::eval(self, params, x)
    }

    /// 由剖面最宽的峰 (`max / divisor` 之上) 估计初值与边界.
    pub fn setup(&self, profile: ArrayView1<f64>, divisor: f64) -> FitResult<FitSetup> {
        match self {
            Self::FlatTopGauss => flat_top::setup(profile, divisor),
            Self::SplitGauss => split_gauss::setup(profile, divisor),
        }
    }

    /// 由拟合参数解析地求出 `max / divisor` 处的全宽.
    pub fn width_at(&self, params: &[f64], divisor: f64) -> f64 {
        match self {
            Self::FlatTopGauss => flat_top::width_at(params, divisor),
            Self::SplitGauss => split_gauss::width_at(params, divisor),
        }
    }
}

impl Curve for RampModel {
    #[inline]
    fn eval<T: tiny_solver::factors::na::RealField>(&self, params: &[T], x: T) -> T {
        match self {
            Self::FlatTopGauss => flat_top::eval(params, x),
            Self::SplitGauss => split_gauss::eval(params, x),
        }
    }
}

/// 用 `model` 拟合斜坡剖面, 返回拟合参数与 `max / divisor` 处的全宽.
///
/// # 注意
///
/// 拟合不收敛或结果不是有限值时返回错误, 调用方应将其视为 "结果不可用".
pub fn fit_ramp(profile: ArrayView1<f64>, model: RampModel, divisor: f64) -> FitResult<RampFit> {
    let n = model.n_params();
    if profile.len() < n {
        return Err(FitError::TooFewSamples {
            needed: n,
            got: profile.len(),
        });
    }
    let setup = model.setup(profile, divisor)?;
    let x: Vec<f64> = (0..profile.len()).map(|i| i as f64).collect();
    let y: Vec<f64> = profile.to_vec();

    let params =
        LevenbergMarquardt::default().minimize(&model, &x, &y, &setup.init, &setup.bounds)?;
    let width = model.width_at(&params, divisor);
    if !width.is_finite() {
        return Err(FitError::NonFiniteModel);
    }
    log::debug!("{model:?} 拟合参数 {params:?}, 全宽 {width:.4}");
    Ok(RampFit {
        model,
        params,
        width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn sample(model: RampModel, params: &[f64], len: usize) -> Array1<f64> {
        Array1::from_shape_fn(len, |i| model.eval(params, i as f64))
    }

    #[test]
    fn test_flat_top_round_trip() {
        let truth = [60.0, 14.0, 200.0, 2.0, 20.0];
        let p = sample(RampModel::FlatTopGauss, &truth, 120);
        let fit = fit_ramp(p.view(), RampModel::FlatTopGauss, 2.0).unwrap();
        let expected = RampModel::FlatTopGauss.width_at(&truth, 2.0);
        assert!((fit.width - expected).abs() / expected < 0.01);
        assert!((fit.params[0] - 60.0).abs() < 0.1);
    }

    #[test]
    fn test_split_gauss_round_trip() {
        let truth = [30.0, 52.0, 4.0, 150.0, 10.0];
        let p = sample(RampModel::SplitGauss, &truth, 90);
        let fit = fit_ramp(p.view(), RampModel::SplitGauss, 2.0).unwrap();
        let expected = RampModel::SplitGauss.width_at(&truth, 2.0);
        assert!((fit.width - expected).abs() / expected < 0.01);
    }

    #[test]
    fn test_noisy_plateau() {
        // 带有小幅确定性扰动的平台.
        let truth = [45.0, 10.0, 100.0, 3.0, 5.0];
        let p = Array1::from_shape_fn(90, |i| {
            RampModel::FlatTopGauss.eval(&truth, i as f64) + 1.5 * ((i * 7) as f64).sin()
        });
        let fit = fit_ramp(p.view(), RampModel::FlatTopGauss, 2.0).unwrap();
        let expected = RampModel::FlatTopGauss.width_at(&truth, 2.0);
        assert!((fit.width - expected).abs() / expected < 0.05);
    }

    #[test]
    fn test_degenerate_inputs() {
        let short = Array1::from_vec(vec![1.0, 2.0, 1.0]);
        assert!(matches!(
            fit_ramp(short.view(), RampModel::FlatTopGauss, 2.0),
            Err(FitError::TooFewSamples { needed: 5, got: 3 })
        ));
        let zeros = Array1::<f64>::zeros(20);
        assert!(matches!(
            fit_ramp(zeros.view(), RampModel::SplitGauss, 2.0),
            Err(FitError::Seed(_))
        ));
    }

    #[test]
    fn test_project() {
        let b = FitBounds {
            lower: vec![0.0, f64::NEG_INFINITY],
            upper: vec![1.0, 0.0],
        };
        assert_eq!(b.project(&[-1.0, 3.0]), vec![0.0, 0.0]);
        assert_eq!(b.project(&[0.5, -3.0]), vec![0.5, -3.0]);
    }
}
