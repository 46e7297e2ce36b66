//! 合成中型 ACR 体模序列.
//!
//! 256 x 256, 1mm 像素, 5mm 层厚. 内插件位于第一层, 分辨率插件位于下方, 圆形插件位于左侧.

use acr_med::prelude::*;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::env;

const N: usize = 256;
const CENTRE: f64 = 128.0;
const RADIUS: f64 = 82.5;

/// 体模内部的基准信号.
const BASE: f32 = 100.0;
/// 斜坡, 楔形与条栅的亮区信号.
const BRIGHT: f32 = 200.0;

/// 合成参数.
#[derive(Copy, Clone, Debug)]
pub struct SynthConfig {
    /// 高斯噪声的标准差.
    pub noise: f64,
    /// 随机数种子.
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            noise: 2.0,
            seed: 42,
        }
    }
}

impl SynthConfig {
    /// 从 `$ACR_SANITY_NOISE` 与 `$ACR_SANITY_SEED` 读取参数, 缺失或无法解析时使用默认值.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(noise) = env::var("ACR_SANITY_NOISE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
        {
            cfg.noise = noise;
        }
        if let Some(seed) = env::var("ACR_SANITY_SEED")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            cfg.seed = seed;
        }
        cfg
    }
}

fn disc(inside: f32) -> Array2<f32> {
    Array2::from_shape_fn((N, N), |(h, w)| {
        let (dy, dx) = (h as f64 - CENTRE, w as f64 - CENTRE);
        if dx * dx + dy * dy <= RADIUS * RADIUS {
            inside
        } else {
            0.0
        }
    })
}

/// 填充左闭右开矩形 `[x0, x1) x [y0, y1)`.
fn fill(img: &mut Array2<f32>, (x0, y0, x1, y1): (usize, usize, usize, usize), v: f32) {
    for h in y0..y1 {
        for w in x0..x1 {
            img[(h, w)] = v;
        }
    }
}

/// 一对楔形. 两个楔形在上方, 各自的暗区从 `y = 63` 开始, 长度分别为 `left` 与 `right`.
fn wedges(img: &mut Array2<f32>, left: usize, right: usize) {
    fill(img, (123, 63, 125, 83), BRIGHT);
    fill(img, (129, 63, 131, 83), BRIGHT);
    fill(img, (123, 63, 125, 63 + left), 0.0);
    fill(img, (129, 63, 131, 63 + right), 0.0);
}

/// 内插件层面.
fn inserts_slice() -> Array2<f32> {
    let mut img = disc(BASE);

    // 分辨率插件对侧的方位采样盒更亮.
    fill(&mut img, (123, 101, 134, 112), 1.5 * BASE);
    // 圆形插件对侧的副采样盒更亮.
    fill(&mut img, (156, 95, 162, 101), 1.5 * BASE);

    // 两条水平斜坡, 亮区宽 50 像素, 两端各有 5 像素的线性过渡.
    for y in (124..126).chain(128..130) {
        for x in 98..158 {
            let edge = (x - 98).min(157 - x) as f32;
            img[(y, x)] = BASE + (BRIGHT - BASE) * (edge / 5.0).min(1.0);
        }
    }

    // 分辨率条栅: 中心 (130, 164). 水平线段向左, 垂直线段向下.
    for y in 158..=164 {
        for x in 123..=130 {
            img[(y, x)] = if (130 - x) % 2 == 0 { BRIGHT } else { 40.0 };
        }
    }
    for y in 164..=171 {
        for x in (130..=136).step_by(2) {
            img[(y, x)] = if (y - 164) % 3 == 2 { 40.0 } else { BRIGHT };
        }
    }
    for k in 0..19 {
        img[(156 + k, 130)] = img[(156 + k, 130)].max(1.25 * BRIGHT);
        img[(164, 123 + k)] = img[(164, 123 + k)].max(1.25 * BRIGHT);
    }

    wedges(&mut img, 8, 12);
    img
}

/// 主序列的全部 11 层, 不含噪声.
fn clean_slices() -> Vec<Array2<f32>> {
    let mut slices: Vec<_> = (0..ACR_SLICE_COUNT).map(|_| disc(BASE)).collect();
    slices[0] = inserts_slice();
    // 第 5 层信号较低, 用于判断内插件层面.
    slices[4] = disc(0.6 * BASE);
    wedges(&mut slices[10], 10, 10);
    slices
}

/// 叠加噪声后按扫描仪的存储方式量化为 `u16`.
fn with_noise(slices: &[Array2<f32>], noise: &Normal<f64>, rng: &mut StdRng) -> Vec<Array2<u16>> {
    slices
        .iter()
        .map(|s| {
            s.mapv(|v| {
                let noisy = v as f64 + noise.sample(rng);
                noisy.round().clamp(0.0, u16::MAX as f64) as u16
            })
        })
        .collect()
}

/// 生成主序列与重复采集序列. 两者共享同一体模, 噪声独立.
pub fn phantom_pair(cfg: SynthConfig) -> Option<(MrSeries, MrSeries)> {
    let noise = Normal::new(0.0, cfg.noise).ok()?;
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let clean = clean_slices();
    let tags = MrTags::new()
        .with(MrTag::PixelBandwidth, "130")
        .with(MrTag::NumberOfAverages, "1")
        .with(MrTag::NumberOfPhaseEncodingSteps, "256")
        .with(MrTag::InPlanePhaseEncodingDirection, "ROW");
    let spacing = PixelSpacing::isotropic(1.0, 5.0)?;

    let primary = MrSeries::from_raw_slices(
        &with_noise(&clean, &noise, &mut rng),
        spacing,
        tags.clone(),
    )?;
    let repeat = MrSeries::from_raw_slices(&with_noise(&clean, &noise, &mut rng), spacing, tags)?;
    Some((primary, repeat))
}
