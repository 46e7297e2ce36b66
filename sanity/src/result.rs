//! 运行结果.

use acr_med::modules::*;
use acr_med::prelude::*;
use std::io::{self, Write};

const SEP: &str = "--------------------------------------------------------";
const S4: &str = "    ";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

#[inline]
fn f64_to_display(f: Option<f64>) -> String {
    match f {
        Some(f) => format!("{f:.4}"),
        None => "/".to_string(),
    }
}

/// 单个模块的输出.
#[derive(Clone, Debug)]
pub enum ModuleReport {
    Snr(SubtractionSnrOutput),
    Uniformity(UniformityOutput),
    Ghosting(GhostingOutput),
    PhantomWidth(PhantomWidthOutput),
    SliceWidth(SliceWidthOutput),
    SlicePosition(SlicePositionOutput),
    Resolution(ResolutionOutput),
}

/// 将 `report` 写进 `w` 中.
fn describe_into<W: Write>(name: &str, report: &ModuleReport, w: &mut W) -> io::Result<()> {
    writeln!(w, "Module `{name}`:")?;
    match report {
        ModuleReport::Snr(o) => {
            writeln!(w, "{S4}Slice: {}", o.slice + 1)?;
            writeln!(w, "{S4}Signal: {:.4}", o.signal)?;
            writeln!(w, "{S4}Noise: {:.4}", o.noise)?;
            writeln!(w, "{S4}SNR: {:.4}", o.snr)?;
            write!(w, "{S4}Corrected SNR: {}", f64_to_display(o.corrected_snr))?;
        }
        ModuleReport::Uniformity(o) => {
            writeln!(w, "{S4}Slice: {}", o.slice + 1)?;
            write!(w, "{S4}Uniformity: {:.4} %", o.uniformity)?;
        }
        ModuleReport::Ghosting(o) => {
            writeln!(w, "{S4}Slice: {}", o.slice + 1)?;
            write!(w, "{S4}Ghosting: {:.4} %", o.ghosting)?;
        }
        ModuleReport::PhantomWidth(o) => {
            writeln!(w, "{S4}Slice: {}", o.slice + 1)?;
            for line in WidthLine::ALL {
                writeln!(w, "{S4}Width ({line}): {} mm", f64_to_display(o.width(line)))?;
            }
            writeln!(w, "{S4}Average: {} mm", f64_to_display(o.average))?;
            writeln!(w, "{S4}Linearity: {} mm", f64_to_display(o.linearity))?;
            write!(w, "{S4}Distortion: {} %", f64_to_display(o.distortion))?;
        }
        ModuleReport::SliceWidth(o) => {
            writeln!(w, "{S4}Ramp direction: {}", o.ramp_direction)?;
            writeln!(w, "{S4}Expected width: {:.4} mm", o.expected_width)?;
            writeln!(w, "{S4}Top ramp: {} mm", f64_to_display(o.top_ramp_width))?;
            writeln!(w, "{S4}Bottom ramp: {} mm", f64_to_display(o.bottom_ramp_width))?;
            write!(w, "{S4}Slice width: {} mm", f64_to_display(o.slice_width))?;
        }
        ModuleReport::SlicePosition(o) => {
            writeln!(w, "{S4}Wedge: {} ({})", o.wedge_side, o.wedge_direction)?;
            writeln!(w, "{S4}Slice 1: {} mm", f64_to_display(o.slice_1_position))?;
            write!(w, "{S4}Slice 11: {} mm", f64_to_display(o.slice_11_position))?;
        }
        ModuleReport::Resolution(o) => {
            let centre = o
                .centre
                .map_or_else(|| "/".to_string(), |(x, y)| format!("({x}, {y})"));
            writeln!(w, "{S4}Slice: {}", o.slice + 1)?;
            writeln!(w, "{S4}Insert centre: {centre}")?;
            writeln!(w, "{S4}Horizontal: {} %", f64_to_display(o.horizontal_contrast))?;
            writeln!(w, "{S4}Vertical: {} %", f64_to_display(o.vertical_contrast))?;
            writeln!(w, "{S4}Total: {} %", f64_to_display(o.total_contrast))?;
            writeln!(w, "{S4}Phase encode: {} %", f64_to_display(o.phase_encode_contrast))?;
            write!(
                w,
                "{S4}Frequency encode: {} %",
                f64_to_display(o.frequency_encode_contrast)
            )?;
        }
    }
    Ok(())
}

/// 整体运行结果.
pub struct SanityResult {
    context: MedAcrContext,
    context_boxes: usize,
    data: Vec<(&'static str, AnalysisResult<ModuleReport>)>,
}

impl SanityResult {
    pub fn new(
        context: MedAcrContext,
        context_boxes: usize,
        data: Vec<(&'static str, AnalysisResult<ModuleReport>)>,
    ) -> Self {
        Self {
            context,
            context_boxes,
            data,
        }
    }

    /// 失败的模块数.
    pub fn failures(&self) -> usize {
        self.data.iter().filter(|(_, r)| r.is_err()).count()
    }

    /// 打印运行结果.
    pub fn analyze(&self) {
        sep();
        let b = self.context.boundary();
        println!("Context:");
        println!(
            "{S4}Boundary: x [{}, {}], y [{}, {}]",
            b.xmin, b.xmax, b.ymin, b.ymax
        );
        println!("{S4}Inserts slice: {}", self.context.inserts_slice().index() + 1);
        println!("{S4}Resolution insert: {}", self.context.res_side());
        println!("{S4}Circle insert: {}", self.context.circle_side());
        println!("{S4}Sampling boxes registered: {}", self.context_boxes);
        sep();

        let mut buf = Vec::with_capacity(512);
        for (key, report) in self.data.iter() {
            match report {
                Ok(report) => {
                    describe_into(key, report, &mut buf).unwrap();
                    println!("{}", String::from_utf8_lossy(&buf));
                    buf.clear();
                }
                Err(e) => println!("Module `{key}` failed: {e}"),
            }
            sep();
        }
    }
}
