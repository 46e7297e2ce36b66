//! 带边界约束的 Levenberg–Marquardt 非线性最小二乘, 由 `tiny_solver` 求解.
//!
//! 求解器只处理无约束问题, 因此参数边界通过变量代换实现: 求解器在内部变量 `u` 上迭代,
//! 模型看到的外部参数 `p = g(u)` 始终位于可行域内. 雅可比矩阵由 `tiny_solver` 自动微分求得,
//! 因此曲线必须对任意 [`RealField`](ts_na::RealField) 标量求值.

use std::collections::HashMap;

use tiny_solver::factors::na as ts_na;
use tiny_solver::Optimizer;

use super::{FitBounds, FitError, FitResult};

/// 参数向量在求解器中的名字.
const PARAMS: &str = "p";

/// 可被拟合的一元参数曲线.
pub(crate) trait Curve: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// 在 `x` 处求值.
    fn eval<T: ts_na::RealField>(&self, params: &[T], x: T) -> T;
}

/// 单个参数的边界形式.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Bound {
    Free,
    Lower(f64),
    Upper(f64),
    Both(f64, f64),
}

impl Bound {
    fn new(lo: f64, hi: f64) -> Self {
        match (lo.is_finite(), hi.is_finite()) {
            (true, true) if hi > lo => Self::Both(lo, hi),
            (true, false) => Self::Lower(lo),
            (false, true) => Self::Upper(hi),
            _ => Self::Free,
        }
    }

    /// 外部参数到内部变量. `p` 需已位于可行域内.
    fn to_internal(self, p: f64) -> f64 {
        match self {
            Self::Free => p,
            Self::Lower(lo) => ((p - lo + 1.0).powi(2) - 1.0).max(0.0).sqrt(),
            Self::Upper(hi) => ((hi - p + 1.0).powi(2) - 1.0).max(0.0).sqrt(),
            Self::Both(lo, hi) => (2.0 * (p - lo) / (hi - lo) - 1.0).clamp(-1.0, 1.0).asin(),
        }
    }

    /// 内部变量到外部参数: `lo - 1 + sqrt(u^2 + 1)`, `hi + 1 - sqrt(u^2 + 1)`
    /// 或 `lo + (hi - lo) * (1 + sin(u)) / 2`.
    fn to_external<T: ts_na::RealField>(self, u: T) -> T {
        let one: T = ts_na::convert(1.0);
        match self {
            Self::Free => u,
            Self::Lower(lo) => {
                ts_na::convert::<f64, T>(lo - 1.0) + (u.clone() * u + one).sqrt()
            }
            Self::Upper(hi) => {
                ts_na::convert::<f64, T>(hi + 1.0) - (u.clone() * u + one).sqrt()
            }
            Self::Both(lo, hi) => {
                let half: T = ts_na::convert((hi - lo) / 2.0);
                ts_na::convert::<f64, T>(lo) + half * (u.sin() + one)
            }
        }
    }
}

/// 单个采样点的残差 `y - f(g(u), x)`.
#[derive(Debug, Clone)]
struct SampleFactor<C> {
    curve: C,
    bounds: Vec<Bound>,
    x: f64,
    y: f64,
}

impl<C: Curve, T: ts_na::RealField> tiny_solver::factors::Factor<T> for SampleFactor<C> {
    fn residual_func(&self, params: &[ts_na::DVector<T>]) -> ts_na::DVector<T> {
        let p: Vec<T> = params[0]
            .iter()
            .zip(&self.bounds)
            .map(|(u, b)| b.to_external(u.clone()))
            .collect();
        let fx = self.curve.eval(&p, ts_na::convert(self.x));
        ts_na::DVector::<T>::from_vec(vec![ts_na::convert::<f64, T>(self.y) - fx])
    }
}

/// Levenberg–Marquardt 求解器配置.
#[derive(Copy, Clone, Debug)]
pub(crate) struct LevenbergMarquardt {
    /// 最大迭代次数.
    pub max_iter: usize,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self { max_iter: 200 }
    }
}

impl LevenbergMarquardt {
    /// 以 `init` 为初值, 在 `bounds` 约束下最小化 `sum (y - curve(p, x))^2`.
    ///
    /// # 注意
    ///
    /// 初值会先被投影到可行域内. 恰好落在单侧边界上的参数在代换后梯度为 0, 不会再离开边界.
    pub fn minimize<C: Curve>(
        &self,
        curve: &C,
        x: &[f64],
        y: &[f64],
        init: &[f64],
        bounds: &FitBounds,
    ) -> FitResult<Vec<f64>> {
        let n = init.len();
        if x.len() < n || y.len() != x.len() {
            return Err(FitError::TooFewSamples {
                needed: n,
                got: x.len().min(y.len()),
            });
        }
        let start = bounds.project(init);
        if x.iter().any(|&v| !curve.eval(&start, v).is_finite()) {
            return Err(FitError::NonFiniteModel);
        }

        let kinds: Vec<Bound> = bounds
            .lower
            .iter()
            .zip(&bounds.upper)
            .map(|(&lo, &hi)| Bound::new(lo, hi))
            .collect();
        let u0: Vec<f64> = start
            .iter()
            .zip(&kinds)
            .map(|(&p, b)| b.to_internal(p))
            .collect();

        let mut problem = tiny_solver::Problem::new();
        for (&x, &y) in x.iter().zip(y) {
            problem.add_residual_block(
                1,
                &[PARAMS],
                Box::new(SampleFactor {
                    curve: curve.clone(),
                    bounds: kinds.clone(),
                    x,
                    y,
                }),
                None,
            );
        }
        let mut initial_values = HashMap::<String, ts_na::DVector<f64>>::new();
        initial_values.insert(PARAMS.to_string(), ts_na::DVector::<f64>::from_vec(u0));

        let optimizer = tiny_solver::LevenbergMarquardtOptimizer::default();
        let options = tiny_solver::OptimizerOptions {
            max_iteration: self.max_iter.max(1),
            verbosity_level: 0,
            ..Default::default()
        };
        let result = optimizer
            .optimize(&problem, &initial_values, Some(options))
            .ok_or(FitError::NoSolution)?;
        let u = result.get(PARAMS).ok_or(FitError::NoSolution)?;
        if u.len() != n {
            return Err(FitError::NoSolution);
        }

        let p: Vec<f64> = u.iter().zip(&kinds).map(|(&u, b)| b.to_external(u)).collect();
        if p.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFiniteModel);
        }
        log::debug!("LM: {n} 个参数, {} 个采样点, 结果 {p:?}", x.len());
        Ok(p)
    }
}
