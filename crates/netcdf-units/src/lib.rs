//! Unit normalization for CORDEX NetCDF files.
//!
//! CORDEX ships near-surface air temperature (`tas`) in Kelvin. The
//! conversion rewrites the variable in place, in Celsius, and updates its
//! `units` attribute. Values equal to the variable's fill value stay as
//! they are so masked cells remain masked.
//!
//! # System requirements
//!
//! The `netcdf` crate links against libnetcdf and HDF5
//! (`libnetcdf-dev libhdf5-dev`).

mod convert;
pub mod error;
mod native;

pub use convert::{
    convert_kelvin_to_celsius, read_tas, ConversionOutcome, TasField, CELSIUS_UNITS,
    KELVIN_OFFSET,
};
pub use error::{NetCdfError, NetCdfResult};
pub use native::silence_hdf5_errors;
