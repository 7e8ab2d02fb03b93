//! Season calendar used to date raster bands.
//!
//! Bands carry no time coordinate once the data is in GeoTIFF form, so
//! dates are assigned positionally: band `i` covers the interval starting
//! `i * interval_months` after a base date.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CordexError, CordexResult};

/// Months covered by one seasonal band.
pub const SEASON_MONTHS: u32 = 3;

/// First season of the mosaic (winter 2020/21).
pub const MOSAIC_BASE_DATE: (i32, u32, u32) = (2020, 12, 1);

/// Half-open date interval `[start, end)` covered by one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SeasonInterval {
    /// Band description, e.g. `2020-12-01 - 2021-03-01`.
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Fixed-step calendar anchored at a base date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonCalendar {
    pub base: NaiveDate,
    pub interval_months: u32,
}

impl Default for SeasonCalendar {
    fn default() -> Self {
        let (y, m, d) = MOSAIC_BASE_DATE;
        Self {
            base: NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN),
            interval_months: SEASON_MONTHS,
        }
    }
}

impl SeasonCalendar {
    pub fn new(base: NaiveDate, interval_months: u32) -> Self {
        Self {
            base,
            interval_months,
        }
    }

    /// Calendar of a per-decade file: seasons start on December 1st of
    /// the file's start year.
    pub fn for_start_year(start_year: i32) -> CordexResult<Self> {
        let base = NaiveDate::from_ymd_opt(start_year, 12, 1)
            .ok_or_else(|| CordexError::DateOutOfRange(format!("{}-12-01", start_year)))?;
        Ok(Self::new(base, SEASON_MONTHS))
    }

    /// Start date of band `index` (0-based).
    pub fn band_date(&self, index: usize) -> CordexResult<NaiveDate> {
        self.offset(index)
    }

    /// Interval covered by band `index` (0-based).
    pub fn interval(&self, index: usize) -> CordexResult<SeasonInterval> {
        Ok(SeasonInterval {
            start: self.offset(index)?,
            end: self.offset(index + 1)?,
        })
    }

    /// Band description for band `index` (0-based).
    pub fn interval_label(&self, index: usize) -> CordexResult<String> {
        self.interval(index).map(|i| i.label())
    }

    fn offset(&self, index: usize) -> CordexResult<NaiveDate> {
        let months = u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(self.interval_months))
            .ok_or_else(|| CordexError::DateOutOfRange(format!("band index {}", index)))?;

        self.base
            .checked_add_months(Months::new(months))
            .ok_or_else(|| {
                CordexError::DateOutOfRange(format!("{} + {} months", self.base, months))
            })
    }
}
