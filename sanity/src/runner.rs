//! 程序运行函数.

use crate::result::{ModuleReport, SanityResult};
use crate::synth::{self, SynthConfig};
use acr_med::context::CONTEXT_MODULE;
use acr_med::modules::*;
use acr_med::prelude::*;
use std::thread;

/// 实际运行.
pub fn run() -> SanityResult {
    let cfg = SynthConfig::from_env();
    log::info!("合成体模: noise {}, seed {}", cfg.noise, cfg.seed);
    let (primary, repeat) = synth::phantom_pair(cfg).expect("Synthesising phantom error");

    let mut builder = ContextBuilder::new(InsertsSelection {
        show_boxes: true,
        ..Default::default()
    });
    let mut registry = MemoryRegistry::new();
    let ctx = builder
        .build(&primary, &ThresholdDetector::new(0.25), Some(&mut registry))
        .expect("Building context error");
    let boxes = registry.rois_of(CONTEXT_MODULE).count();

    let input = AnalysisInput::new(&primary).with_repeat(&repeat);

    println!("Running measurement modules...");
    let data: Vec<(&str, AnalysisResult<ModuleReport>)> = thread::scope(|s| {
        let ctx = &ctx;
        let handles = vec![
            (
                "snr",
                s.spawn(move || {
                    SubtractionSnr::default()
                        .run(ctx, &input, None)
                        .map(|r| ModuleReport::Snr(r.output))
                }),
            ),
            (
                "uniformity",
                s.spawn(move || {
                    Uniformity::default()
                        .run(ctx, &input, None)
                        .map(|r| ModuleReport::Uniformity(r.output))
                }),
            ),
            (
                "ghosting",
                s.spawn(move || {
                    Ghosting::default()
                        .run(ctx, &input, None)
                        .map(|r| ModuleReport::Ghosting(r.output))
                }),
            ),
            (
                "phantom width",
                s.spawn(move || {
                    PhantomWidth::default()
                        .run(ctx, &input, None)
                        .map(|r| ModuleReport::PhantomWidth(r.output))
                }),
            ),
            (
                "slice width",
                s.spawn(move || {
                    SliceWidth::default()
                        .run(ctx, &input, None)
                        .map(|r| ModuleReport::SliceWidth(r.output))
                }),
            ),
            (
                "slice position",
                s.spawn(move || {
                    SlicePosition
                        .run(ctx, &input, None)
                        .map(|r| ModuleReport::SlicePosition(r.output))
                }),
            ),
            (
                "resolution",
                s.spawn(move || {
                    Resolution::default()
                        .run(ctx, &input, None)
                        .map(|r| ModuleReport::Resolution(r.output))
                }),
            ),
        ];

        handles
            .into_iter()
            .map(|(name, th)| (name, th.join().expect("Thread joining error")))
            .collect()
    });

    SanityResult::new(ctx, boxes, data)
}
