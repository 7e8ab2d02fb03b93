//! Kelvin to Celsius conversion of the `tas` variable.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::{get_f64_attr, get_str_attr, silence_hdf5_errors};

/// Near-surface air temperature variable.
pub const TAS_VARIABLE: &str = "tas";

/// Offset between Kelvin and Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// `units` attribute written after conversion.
pub const CELSIUS_UNITS: &str = "Celsius";

/// What happened to a file handed to [`convert_kelvin_to_celsius`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Values were shifted and the units attribute rewritten.
    Converted {
        /// Number of values converted
        values: usize,
        /// Number of fill values left untouched
        masked: usize,
    },
    /// The file has no `tas` variable and was left as is.
    MissingVariable,
    /// `tas` already carries Celsius units; converting again would shift twice.
    AlreadyCelsius,
}

/// Contents of a `tas` variable.
#[derive(Debug, Clone)]
pub struct TasField {
    /// Values in file order (time, rlat, rlon)
    pub values: Vec<f64>,
    pub units: Option<String>,
    pub fill_value: Option<f64>,
}

/// Fill markers declared on a variable.
#[derive(Debug, Clone, Copy, Default)]
struct FillValues {
    fill_value: Option<f64>,
    missing_value: Option<f64>,
}

impl FillValues {
    fn read(var: &netcdf::Variable) -> Self {
        Self {
            fill_value: get_f64_attr(var, "_FillValue"),
            missing_value: get_f64_attr(var, "missing_value"),
        }
    }

    fn is_fill(&self, value: f64) -> bool {
        if value.is_nan() {
            return true;
        }
        [self.fill_value, self.missing_value]
            .iter()
            .flatten()
            .any(|fill| value == *fill || (value as f32) == (*fill as f32))
    }
}

/// Convert `tas` in `path` from Kelvin to Celsius, in place.
///
/// Files without a `tas` variable are not an error; they are reported as
/// [`ConversionOutcome::MissingVariable`] and not modified.
pub fn convert_kelvin_to_celsius(path: &Path) -> NetCdfResult<ConversionOutcome> {
    silence_hdf5_errors();

    // Inspect read-only first so skipped files are never opened for writing.
    if let Some(outcome) = check_convertible(path)? {
        return Ok(outcome);
    }

    let mut file = netcdf::append(path).map_err(|e| NetCdfError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let variable_error = |e: netcdf::Error| NetCdfError::Variable {
        path: path.to_path_buf(),
        variable: TAS_VARIABLE.to_string(),
        message: e.to_string(),
    };
    let missing = || NetCdfError::MissingData(format!("{} in {}", TAS_VARIABLE, path.display()));

    let (fills, mut values) = {
        let var = file.variable(TAS_VARIABLE).ok_or_else(missing)?;
        let values: Vec<f64> = var.get_values(..).map_err(variable_error)?;
        (FillValues::read(&var), values)
    };

    let mut masked = 0;
    for value in values.iter_mut() {
        if fills.is_fill(*value) {
            masked += 1;
        } else {
            *value -= KELVIN_OFFSET;
        }
    }

    // Classic-model files only accept a longer attribute in define mode.
    // Units are relabelled before any value is rewritten.
    file.redef().map_err(variable_error)?;
    file.variable_mut(TAS_VARIABLE)
        .ok_or_else(missing)?
        .put_attribute("units", CELSIUS_UNITS)
        .map_err(variable_error)?;
    file.enddef().map_err(variable_error)?;

    file.variable_mut(TAS_VARIABLE)
        .ok_or_else(missing)?
        .put_values(&values, ..)
        .map_err(variable_error)?;

    // Dropping the handle closes the file and flushes the new values.
    drop(file);

    let converted = values.len() - masked;
    info!(
        path = %path.display(),
        values = converted,
        masked = masked,
        "Converted tas from Kelvin to Celsius"
    );

    Ok(ConversionOutcome::Converted {
        values: converted,
        masked,
    })
}

/// Returns the outcome for files that must not be converted.
fn check_convertible(path: &Path) -> NetCdfResult<Option<ConversionOutcome>> {
    let file = netcdf::open(path).map_err(|e| NetCdfError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let Some(var) = file.variable(TAS_VARIABLE) else {
        debug!(path = %path.display(), "No tas variable, leaving file unchanged");
        return Ok(Some(ConversionOutcome::MissingVariable));
    };

    if get_str_attr(&var, "units").as_deref() == Some(CELSIUS_UNITS) {
        debug!(path = %path.display(), "tas already in Celsius");
        return Ok(Some(ConversionOutcome::AlreadyCelsius));
    }

    Ok(None)
}

/// Read the `tas` variable of a file.
pub fn read_tas(path: &Path) -> NetCdfResult<TasField> {
    silence_hdf5_errors();

    let file = netcdf::open(path).map_err(|e| NetCdfError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let var = file
        .variable(TAS_VARIABLE)
        .ok_or_else(|| NetCdfError::MissingData(format!("{} in {}", TAS_VARIABLE, path.display())))?;

    let values: Vec<f64> = var.get_values(..).map_err(|e| NetCdfError::Variable {
        path: path.to_path_buf(),
        variable: TAS_VARIABLE.to_string(),
        message: e.to_string(),
    })?;

    Ok(TasField {
        values,
        units: get_str_attr(&var, "units"),
        fill_value: get_f64_attr(&var, "_FillValue"),
    })
}
