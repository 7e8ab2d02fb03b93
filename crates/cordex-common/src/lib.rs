//! Common types and utilities shared across the CORDEX pipeline crates.
//!
//! Every stage of the pipeline reads one directory and writes the next. The
//! directory tree, the file naming conventions that decide which files a
//! stage picks up, the season calendar used to label raster bands, and the
//! run manifest all live here so the stages agree on them.

pub mod error;
pub mod layout;
pub mod manifest;
pub mod naming;
pub mod time;

pub use error::{CordexError, CordexResult};
pub use layout::ProjectLayout;
pub use manifest::{Manifest, ManifestRecord, RecordStatus, Stage};
pub use naming::{list_matching, DateRange};
pub use time::{SeasonCalendar, SeasonInterval};
