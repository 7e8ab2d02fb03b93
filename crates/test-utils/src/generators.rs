//! Generators for synthetic CORDEX inputs.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::fixtures::KELVIN_SAMPLES;

/// Shape and contents of a synthetic `tas` NetCDF file.
#[derive(Debug, Clone)]
pub struct TasSpec {
    pub times: usize,
    pub rows: usize,
    pub cols: usize,
    /// `times * rows * cols` values in (time, rlat, rlon) order
    pub values: Vec<f32>,
    pub units: String,
    pub fill_value: Option<f32>,
}

impl TasSpec {
    /// Kelvin field cycling through [`KELVIN_SAMPLES`].
    pub fn kelvin(times: usize, rows: usize, cols: usize) -> Self {
        let values = (0..times * rows * cols)
            .map(|i| KELVIN_SAMPLES[i % KELVIN_SAMPLES.len()])
            .collect();
        Self {
            times,
            rows,
            cols,
            values,
            units: "K".to_string(),
            fill_value: None,
        }
    }

    /// Replace the value at `index` with the fill value.
    pub fn with_fill_at(mut self, index: usize, fill: f32) -> Self {
        self.fill_value = Some(fill);
        self.values[index] = fill;
        self
    }
}

/// Write a rotated-pole `tas` file shaped like a CORDEX seasonal-mean file.
pub fn write_tas_netcdf(path: &Path, spec: &TasSpec) -> Result<(), netcdf::Error> {
    write_tas(netcdf::create(path)?, spec)
}

/// Same as [`write_tas_netcdf`] but in the NETCDF4_CLASSIC layout CORDEX archives ship in.
pub fn write_tas_netcdf_classic(path: &Path, spec: &TasSpec) -> Result<(), netcdf::Error> {
    let options = netcdf::Options::NETCDF4 | netcdf::Options::CLASSIC;
    write_tas(netcdf::create_with(path, options)?, spec)
}

fn write_tas(mut file: netcdf::FileMut, spec: &TasSpec) -> Result<(), netcdf::Error> {
    file.add_dimension("time", spec.times)?;
    file.add_dimension("rlat", spec.rows)?;
    file.add_dimension("rlon", spec.cols)?;

    let mut var = file.add_variable::<f64>("rlat", &["rlat"])?;
    var.put_attribute("units", "degrees")?;
    var.put_attribute("standard_name", "grid_latitude")?;

    let mut var = file.add_variable::<f64>("rlon", &["rlon"])?;
    var.put_attribute("units", "degrees")?;
    var.put_attribute("standard_name", "grid_longitude")?;

    let mut var = file.add_variable::<f64>("time", &["time"])?;
    var.put_attribute("units", "days since 2020-12-01 00:00:00")?;
    var.put_attribute("calendar", "proleptic_gregorian")?;

    let mut var = file.add_variable::<f32>("tas", &["time", "rlat", "rlon"])?;
    if let Some(fill) = spec.fill_value {
        var.set_fill_value(fill)?;
    }
    var.put_attribute("units", spec.units.as_str())?;
    var.put_attribute("standard_name", "air_temperature")?;

    // Classic-model files refuse data writes in define mode.
    file.enddef()?;

    // Rotated coordinates centred on the EUR-11 domain, 0.11° spacing.
    let rlat: Vec<f64> = (0..spec.rows).map(|i| -1.0 + i as f64 * 0.11).collect();
    let rlon: Vec<f64> = (0..spec.cols).map(|i| -1.0 + i as f64 * 0.11).collect();
    let time: Vec<f64> = (0..spec.times).map(|i| i as f64 * 91.0).collect();

    for (name, values) in [("rlat", &rlat), ("rlon", &rlon), ("time", &time)] {
        variable_mut(&mut file, name)?.put_values(values, ..)?;
    }
    variable_mut(&mut file, "tas")?.put_values(&spec.values, ..)?;

    Ok(())
}

fn variable_mut<'f>(
    file: &'f mut netcdf::FileMut,
    name: &str,
) -> Result<netcdf::VariableMut<'f>, netcdf::Error> {
    file.variable_mut(name)
        .ok_or_else(|| netcdf::Error::NotFound(format!("variable {}", name)))
}

/// Write a NetCDF file that has no `tas` variable.
pub fn write_netcdf_without_tas(path: &Path) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path)?;
    file.add_dimension("time", 2)?;
    let mut var = file.add_variable::<f32>("pr", &["time"])?;
    var.put_attribute("units", "kg m-2 s-1")?;
    var.put_values(&[1.0e-5_f32, 2.0e-5], ..)?;
    Ok(())
}

/// Write a zip archive holding `members` as (name, contents) pairs.
pub fn write_zip(path: &Path, members: &[(&str, &[u8])]) -> zip::result::ZipResult<()> {
    let file = File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, contents) in members {
        zip.start_file(*name, options)?;
        zip.write_all(contents)?;
    }
    zip.finish()?;
    Ok(())
}

/// Zip existing files under their own file names.
pub fn zip_files(path: &Path, files: &[&Path]) -> zip::result::ZipResult<()> {
    let contents: Vec<(String, Vec<u8>)> = files
        .iter()
        .map(|f| {
            let name = f
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("member")
                .to_string();
            std::fs::read(f).map(|bytes| (name, bytes))
        })
        .collect::<Result<_, _>>()?;

    let members: Vec<(&str, &[u8])> = contents
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
        .collect();
    write_zip(path, &members)
}
