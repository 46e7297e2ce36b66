//! 从上下文构建到全部测量模块的完整流程.

use acr_med::modules::*;
use acr_med::prelude::*;
use approx::assert_abs_diff_eq;
use ndarray::Array2;

const N: usize = 256;
const C: f64 = 128.0;
const R: f64 = 82.5;

fn disc(inside: f32) -> Array2<f32> {
    Array2::from_shape_fn((N, N), |(h, w)| {
        let (dy, dx) = (h as f64 - C, w as f64 - C);
        if dx * dx + dy * dy <= R * R {
            inside
        } else {
            0.0
        }
    })
}

/// 11 层合成体模: 第 5 层 (索引 4) 较暗, 因此内插件位于第一层;
/// 第一层中心上方的采样盒加亮, 因此分辨率插件位于下方.
fn phantom() -> Vec<Array2<f32>> {
    let mut slices: Vec<_> = (0..11).map(|_| disc(100.0)).collect();
    slices[4] = disc(60.0);
    for h in 101..112 {
        for w in 123..134 {
            slices[0][(h, w)] = 150.0;
        }
    }
    slices
}

/// 在体模内部叠加 `±1` 的棋盘格, 模拟第二次采集.
fn repeat_of(slices: &[Array2<f32>]) -> Vec<Array2<f32>> {
    slices
        .iter()
        .map(|s| {
            let mut s = s.clone();
            for ((h, w), v) in s.indexed_iter_mut() {
                if *v > 0.0 {
                    *v += if (h + w) % 2 == 0 { 1.0 } else { -1.0 };
                }
            }
            s
        })
        .collect()
}

fn series(slices: &[Array2<f32>]) -> MrSeries {
    let tags = MrTags::new()
        .with(MrTag::PixelBandwidth, "130")
        .with(MrTag::InPlanePhaseEncodingDirection, "COL");
    MrSeries::from_slices(slices, PixelSpacing::isotropic(1.0, 5.0).unwrap(), tags).unwrap()
}

#[test]
fn test_full_pipeline() {
    let _ = simple_logger::init_with_level(log::Level::Warn);

    let slices = phantom();
    let primary = series(&slices);
    let repeat = series(&repeat_of(&slices));
    let input = AnalysisInput::new(&primary).with_repeat(&repeat);

    let mut reg = MemoryRegistry::new();
    let ctx = ContextBuilder::default()
        .build(&primary, &ThresholdDetector::new(0.5), Some(&mut reg))
        .unwrap();
    assert_eq!(ctx.inserts_slice(), InsertsSlice::First);
    assert_eq!(ctx.res_side(), Side::Bottom);
    assert_eq!(ctx.circle_side(), Side::Left);
    assert_abs_diff_eq!(ctx.boundary().xcent(), C);
    assert_abs_diff_eq!(ctx.boundary().ycent(), C);

    let snr = SubtractionSnr::default()
        .run(&ctx, &input, Some(&mut reg))
        .unwrap()
        .output;
    assert_eq!(snr.slice, 6);
    assert_abs_diff_eq!(snr.signal, 200.0, epsilon = 0.1);
    assert!(snr.snr.is_finite() && snr.snr > 100.0);
    assert!(snr.corrected_snr.is_none());

    let uniformity = Uniformity::default()
        .run(&ctx, &input, Some(&mut reg))
        .unwrap()
        .output;
    assert_eq!(uniformity.uniformity, 100.0);

    let ghosting = Ghosting::default()
        .run(&ctx, &input, Some(&mut reg))
        .unwrap()
        .output;
    assert_abs_diff_eq!(ghosting.ghosting, 0.0);

    let width = PhantomWidth::default()
        .run(&ctx, &input, Some(&mut reg))
        .unwrap()
        .output;
    assert_eq!(width.slice, 4);
    assert_abs_diff_eq!(width.average.unwrap(), NOMINAL_PHANTOM_WIDTH, epsilon = 1.5);

    let thickness = SliceWidth::default()
        .run(&ctx, &input, Some(&mut reg))
        .unwrap()
        .output;
    assert_eq!(thickness.expected_width, 5.0);

    let position = SlicePosition
        .run(&ctx, &input, Some(&mut reg))
        .unwrap()
        .output;
    assert_eq!(position.wedge_side, Side::Top);
    // 没有楔形结构时两侧的半高位置相同.
    assert_abs_diff_eq!(position.slice_1_position.unwrap(), 0.0);
    assert_abs_diff_eq!(position.slice_11_position.unwrap(), 0.0);

    let resolution = Resolution::default()
        .run(&ctx, &input, Some(&mut reg))
        .unwrap()
        .output;
    assert_eq!(resolution.slice, 0);
    assert_eq!(resolution.horizontal_contrast, Some(0.0));
    // 相位编码方向沿列.
    assert_eq!(resolution.phase_encode_contrast, resolution.vertical_contrast);

    assert_eq!(reg.rois_of("Resolution").count(), 10);
    assert_eq!(reg.rois_of("Subtraction SNR").count(), 2);
    assert_eq!(reg.rois_of("Slice Position").count(), 4);
}

#[test]
fn test_fine_tune_flips_orientation() {
    let slices = phantom();
    let primary = series(&slices);
    let input = AnalysisInput::new(&primary);

    let mut builder = ContextBuilder::default();
    builder.selection.res_side = Side::Right;
    builder.selection.circle_side = Side::Top;
    let det = ThresholdDetector::new(0.5).with_mode(DetectMode::FineTune);
    let ctx = builder.build(&primary, &det, None).unwrap();
    assert_eq!(ctx.res_side(), Side::Right);

    let thickness = SliceWidth::default().run(&ctx, &input, None).unwrap().output;
    assert_eq!(thickness.ramp_direction, Axis::Vertical);
    let position = SlicePosition.run(&ctx, &input, None).unwrap().output;
    assert_eq!(position.wedge_side, Side::Left);
}
