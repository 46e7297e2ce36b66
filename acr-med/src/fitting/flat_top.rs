//! 平顶高斯模型.
//!
//! `f(x) = a * exp(-(((x - c)^2 / (2 * sigma^2))^p)) + b`,
//! 参数顺序为 `(c, sigma, a, p, b)`. `p = 1` 时退化为普通高斯, `p` 越大顶部越平.

use ndarray::ArrayView1;

use tiny_solver::factors::na::{convert, RealField};

use super::{FitBounds, FitResult, FitSetup};
use crate::profile::nth_max_widest_peak;

/// 模型求值.
pub(crate) fn eval<T: RealField>(params: &[T], x: T) -> T {
    let [c, sigma, a, power, b] = [0, 1, 2, 3, 4].map(|i| params[i].clone());
    let zero: T = convert(0.0);
    let d = x - c;
    let u = d.clone() * d / (convert::<f64, T>(2.0) * sigma.clone() * sigma);
    // u = 0 处 u^p 对 p 不可导, 直接取极限 0.
    let up = if u > zero { u.powf(power) } else { zero };
    a * (-up).exp() + b
}

/// 从剖面最宽的峰估计初值: 中心取峰中点, `sigma` 取半宽,
/// 幅度取剖面极差, 指数取 1, 基线取剖面最小值.
pub(crate) fn setup(profile: ArrayView1<f64>, divisor: f64) -> FitResult<FitSetup> {
    let peak = nth_max_widest_peak(profile, divisor)?;
    let (lo, hi) = super::min_max(profile);
    Ok(FitSetup {
        init: vec![peak.centre(), peak.difference() / 2.0, hi - lo, 1.0, lo],
        bounds: FitBounds {
            lower: vec![0.0, 0.0, f64::NEG_INFINITY, 0.0, f64::NEG_INFINITY],
            upper: vec![f64::INFINITY; 5],
        },
    })
}

/// 在 `max / divisor` 处的全宽: `2 * sigma * sqrt(2 * ln(divisor)^(1 / p))`.
#[inline]
pub(crate) fn width_at(params: &[f64], divisor: f64) -> f64 {
    let (sigma, power) = (params[1], params[3]);
    2.0 * sigma * (2.0 * divisor.ln().powf(1.0 / power)).sqrt()
}
