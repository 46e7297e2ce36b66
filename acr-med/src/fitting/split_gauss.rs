//! 分裂高斯模型.
//!
//! 两侧为共享 `sigma` 的高斯肩, 中间 `[c1, c2]` 为平台.
//! 参数顺序为 `(c1, c2, sigma, a, b)`.

use ndarray::ArrayView1;
use tiny_solver::factors::na::{convert, RealField};

use super::{FitBounds, FitResult, FitSetup};
use crate::profile::nth_max_widest_peak;

/// 模型求值.
pub(crate) fn eval<T: RealField>(params: &[T], x: T) -> T {
    let [c1, c2, sigma, a, b] = [0, 1, 2, 3, 4].map(|i| params[i].clone());
    let two_var = convert::<f64, T>(2.0) * sigma.clone() * sigma;
    let shoulder = |d: T| (-(d.clone() * d) / two_var.clone()).exp();
    let shape = if x < c1 {
        shoulder(x - c1)
    } else if x > c2 {
        shoulder(x - c2)
    } else {
        convert(1.0)
    };
    a * shape + b
}

/// 从剖面最宽的峰估计初值: 两个中心取峰的左右交点, `sigma` 取峰宽的 1/4,
/// 幅度取剖面极差, 基线取剖面最小值.
pub(crate) fn setup(profile: ArrayView1<f64>, divisor: f64) -> FitResult<FitSetup> {
    let peak = nth_max_widest_peak(profile, divisor)?;
    let (lo, hi) = super::min_max(profile);
    Ok(FitSetup {
        init: vec![
            peak.minimum,
            peak.maximum,
            peak.difference() / 4.0,
            hi - lo,
            lo,
        ],
        bounds: FitBounds {
            lower: vec![0.0, 0.0, 0.0, f64::NEG_INFINITY, f64::NEG_INFINITY],
            upper: vec![f64::INFINITY; 5],
        },
    })
}

/// 在 `max / divisor` 处的全宽: `|c2 - c1| + 2 * sigma * sqrt(2 * ln(divisor))`.
#[inline]
pub(crate) fn width_at(params: &[f64], divisor: f64) -> f64 {
    let (c1, c2, sigma) = (params[0], params[1], params[2]);
    (c2 - c1).abs() + 2.0 * sigma * (2.0 * divisor.ln()).sqrt()
}
