//! Shared test utilities for the CORDEX pipeline workspace.
//!
//! - Scratch directory helpers and tool detection
//! - Skip macros for tests that need the GDAL command-line utilities
//! - Generators for synthetic CORDEX NetCDF files and zip archives
//! - Common fixture names
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Skip a test when a command-line tool is not installed.
///
/// ```ignore
/// #[test]
/// fn test_warp() {
///     test_utils::require_command!("gdalwarp");
///     // ...
/// }
/// ```
#[macro_export]
macro_rules! require_command {
    ($($name:expr),+ $(,)?) => {{
        $(
            if !$crate::command_available($name) {
                eprintln!("SKIPPED: '{}' not found on PATH.", $name);
                return;
            }
        )+
    }};
}

/// Macro for approximate floating-point equality assertions.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
