//! Vietnamese word segmentation on top of a token-classification encoder.
//!
//! A pretrained checkpoint labels every sub-word token as beginning (`B`)
//! or continuing (`I`) a word. [`WordSegments`] turns those labels into word
//! lists where multi-syllable words are joined with `_`:
//!
//! ```no_run
//! use segmenter::{SegmentOptions, WordSegments};
//!
//! let segments = WordSegments::new("Tôi là sinh viên", "vi", &SegmentOptions::default())?;
//! assert_eq!(segments[0], vec!["tôi", "là", "sinh_viên"]);
//! # Ok::<(), segmenter::SegmentError>(())
//! ```
//!
//! Tokenizer, model and inference pipeline are expensive to build and are
//! kept in a [`ModelCache`]. Each artifact is rebuilt only when the options
//! it depends on change.

pub mod cache;
pub mod device;
pub mod error;
pub mod language;
pub mod loader;
pub mod options;
pub mod pipeline;
pub mod reconstruct;
pub mod segments;
pub mod token;

pub use cache::{ArtifactConfig, ModelCache, Refresh};
pub use device::DeviceSpec;
pub use error::{Result, SegmentError};
pub use language::Language;
pub use layers::Precision;
pub use loader::{ArtifactLoader, ModelSource, PretrainedLoader};
pub use options::SegmentOptions;
pub use pipeline::{ClassifyTokens, TokenClassificationPipeline};
pub use segments::{Texts, WordSegments};
pub use token::{ClassificationToken, EntityLabel};
