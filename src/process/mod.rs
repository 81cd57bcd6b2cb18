pub mod facet;
pub mod periods;
pub mod resample;

pub use facet::{facet_by_group, FacetGrid, Panel, Series, SeriesPoint};
pub use periods::{segment_by_period, Period, PeriodSlice, DEFAULT_PERIODS};
pub use resample::{
    cumulative_frames, resample_monthly, AnimationTable, FrameRow, GroupKey, ResampledPoint,
    ResampledSeries,
};
