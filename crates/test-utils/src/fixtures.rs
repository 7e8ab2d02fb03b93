//! Fixture names and values shared by the pipeline tests.

/// Raw name prefix used by the CDS archives for the REMO2009 RCP 4.5 run.
pub const RAW_PREFIX: &str = "tas_EUR-11_MPI-M-MPI-ESM-LR_rcp45_r1i1p1_MPI-CSC-REMO2009_v1_sem_";

/// Raw file name for a `YYYYMM-YYYYMM` coverage token.
pub fn raw_cordex_name(range: &str) -> String {
    format!("{}{}.nc", RAW_PREFIX, range)
}

/// Coverage of the first decade of the default download.
pub const FIRST_DECADE: &str = "202012-203011";

/// Coverage used by the end-to-end scenario.
pub const SCENARIO_DECADE: &str = "201012-202011";

/// Kelvin values around a European winter/summer spread.
pub const KELVIN_SAMPLES: [f32; 6] = [263.15, 268.4, 273.15, 280.0, 293.65, 301.2];

/// Fill value CORDEX files declare for `tas`.
pub const CORDEX_FILL_VALUE: f32 = 1.0e20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_cordex_name() {
        assert_eq!(
            raw_cordex_name(SCENARIO_DECADE),
            "tas_EUR-11_MPI-M-MPI-ESM-LR_rcp45_r1i1p1_MPI-CSC-REMO2009_v1_sem_201012-202011.nc"
        );
    }
}
