use thiserror::Error;

use crate::profile::ProfileError;

/// 曲线拟合错误. 调用方通常将其视为 "拟合结果不可用".
#[derive(Clone, Debug, PartialEq, Error)]
pub enum FitError {
    /// 采样点个数少于待拟合参数个数.
    #[error("采样点不足: 至少需要 {needed} 个, 实际 {got} 个")]
    TooFewSamples {
        /// 所需的最少采样点数.
        needed: usize,
        /// 实际采样点数.
        got: usize,
    },

    /// 初始参数下模型或残差不是有限值.
    #[error("模型在初始参数下产生了非有限值")]
    NonFiniteModel,

    /// 求解器没有给出结果, 例如法方程奇异.
    #[error("求解器未能给出解")]
    NoSolution,

    /// 无法从剖面中求得初始值.
    #[error("无法估计初始值: {0}")]
    Seed(#[from] ProfileError),
}

/// 曲线拟合结果.
pub type FitResult<T> = Result<T, FitError>;
