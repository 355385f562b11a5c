//! Command-line front end for Vietnamese word segmentation.
//!
//! The heavy lifting lives in the `segmenter` crate; this crate adds file
//! configuration with `key=value` overrides and the `vwsegment` binary.

pub mod config;

pub use config::{
    apply_overrides, AppConfig, ConfigError, ConfigOverride, ModelConfig, OutputConfig,
    OutputFormat,
};
pub use segmenter::{
    DeviceSpec, Language, ModelCache, ModelSource, Precision, PretrainedLoader, SegmentError,
    SegmentOptions, WordSegments,
};
