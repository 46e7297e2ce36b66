//! 🧲欢迎光临🧪
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx2dF};

pub use crate::data::{MrSeries, MrTag, MrTags, PixelSpacing, ScanSlice};

pub use crate::context::{
    Axis, BoundaryContext, BoundaryDetector, ContextBuilder, ContextError, ContextResult,
    DetectMode, InsertsSelection, InsertsSlice, MedAcrContext, Side, ThresholdDetector,
};

pub use crate::fitting::{fit_ramp, FitError, FitResult, RampFit, RampModel};

pub use crate::profile::{nth_max_bounds, nth_max_positions, nth_max_widest_peak, Bounds};

pub use crate::roi::{ImageRef, MemoryRegistry, Roi, RoiRegistry, RoiSet, RoiShape};

pub use crate::modules::{AnalysisError, AnalysisInput, AnalysisResult, PhantomModule};

pub use crate::consts::{ACR_SLICE_COUNT, NOMINAL_PHANTOM_WIDTH};
