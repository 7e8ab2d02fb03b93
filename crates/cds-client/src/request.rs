//! Retrieve request parameters.

use serde::{Deserialize, Serialize};

/// CDS dataset holding the CORDEX single-level projections.
pub const CORDEX_DATASET: &str = "projections-cordex-domains-single-levels";

/// Parameters of a CORDEX retrieve request.
///
/// Serialized as the `inputs` object of a CDS process execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveRequest {
    pub format: String,
    pub domain: String,
    /// Representative Concentration Pathway
    pub experiment: String,
    pub horizontal_resolution: String,
    /// Aggregation period; seasonal means cover 3 months
    pub temporal_resolution: String,
    pub variable: String,
    /// Regional climate model
    pub rcm_model: String,
    /// Global model driving the regional model's boundaries
    pub gcm_model: String,
    pub ensemble_member: String,
    pub start_year: String,
    pub end_year: String,
}

impl RetrieveRequest {
    /// Near-surface temperature, Europe 0.11°, RCP 4.5, seasonal means,
    /// REMO2009 driven by MPI-ESM-LR r1i1p1.
    pub fn cordex_tas(start_year: i32, end_year: i32) -> Self {
        Self {
            format: "zip".to_string(),
            domain: "europe".to_string(),
            experiment: "rcp_4_5".to_string(),
            horizontal_resolution: "0_11_degree_x_0_11_degree".to_string(),
            temporal_resolution: "seasonal_mean".to_string(),
            variable: "2m_air_temperature".to_string(),
            rcm_model: "mpi_csc_remo2009".to_string(),
            gcm_model: "mpi_m_mpi_esm_lr".to_string(),
            ensemble_member: "r1i1p1".to_string(),
            start_year: start_year.to_string(),
            end_year: end_year.to_string(),
        }
    }
}
