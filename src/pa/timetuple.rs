//! Calendar arithmetic over CAMx `(julian date, fractional time)` pairs.
//!
//! CAMx stamps records with a julian date (`YYJJJ`, occasionally already
//! widened to `YYYYJJJ`) and an `HHMM` float time. The last stamp of a day
//! is written as `(same date, 2400)` rather than `(next date, 0000)`; both
//! encodings resolve to the same absolute instant here.

use crate::pa::error::{PaError, Result};

/// Days from 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = if m > 2 { m - 3 } else { m + 9 } as i64;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// Inverse of [`days_from_civil`], returning `(year, day_of_year)`.
fn civil_from_days(days: i64) -> (i64, i64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    let jan1 = days_from_civil(y, 1, 1);
    (y, days - jan1 + 1)
}

/// Expands a two-digit-year julian date to a four-digit year. Years 70..=99
/// map to 19xx, 0..=69 to 20xx; already-wide dates pass through.
fn expand_year(date: i32) -> (i64, i64) {
    let y = (date / 1000) as i64;
    let j = (date % 1000) as i64;
    let year = if y >= 1000 {
        y
    } else if y >= 70 {
        1900 + y
    } else {
        2000 + y
    };
    (year, j)
}

fn date_to_days(date: i32) -> i64 {
    let (year, doy) = expand_year(date);
    days_from_civil(year, 1, 1) + doy - 1
}

fn days_to_date(days: i64, wide: bool) -> i32 {
    let (year, doy) = civil_from_days(days);
    let yy = if wide { year } else { year % 100 };
    (yy * 1000 + doy) as i32
}

fn minutes_of_hhmm(time: f32) -> i64 {
    let t = time.round() as i64;
    (t / 100) * 60 + t % 100
}

fn hhmm_of_minutes(minutes: i64) -> f32 {
    ((minutes / 60) * 100 + minutes % 60) as f32
}

/// Absolute minutes since the epoch for a `(date, time)` stamp. An `HHMM`
/// time of 2400 lands on the following midnight, so the two encodings of a
/// day boundary compare equal.
pub fn abs_minutes(date: i32, time: f32) -> i64 {
    date_to_days(date) * 1440 + minutes_of_hhmm(time)
}

/// Converts a CAMx `(YYJJJ, HHMM)` stamp to IOAPI-style `(YYYYJJJ, HHMMSS)`.
pub fn camx_to_ioapi(date: i32, time: f32) -> (i32, i32) {
    let (year, doy) = expand_year(date);
    let hhmmss = (time.round() as i32) * 100;
    ((year * 1000 + doy) as i32, hhmmss)
}

/// The file's enumerated time range: start/end bounds from the header plus
/// the empirically inferred step (files do not declare their own step size).
#[derive(Debug, Clone)]
pub struct TimeLine {
    start_date: i32,
    start_time: f32,
    start_abs: i64,
    /// Dates in this file carry four-digit years.
    wide: bool,
    /// Inferred step, in minutes.
    pub step_min: i64,
    /// Number of data timesteps in the file.
    pub nsteps: usize,
}

impl TimeLine {
    /// Builds the timeline from the header bounds and the stamp of an early
    /// data record. The simulation period must be an exact multiple of the
    /// inferred step; anything else means a corrupt or mis-parsed header.
    pub fn infer(
        start: (i32, f32),
        end: (i32, f32),
        first_stamp: (i32, f32),
    ) -> Result<Self> {
        let start_abs = abs_minutes(start.0, start.1);
        let step_min = abs_minutes(first_stamp.0, first_stamp.1) - start_abs;
        if step_min <= 0 {
            return Err(PaError::HeaderCorrupt(format!(
                "inferred time step is not positive: first data stamp ({}, {}) \
                 does not follow start ({}, {})",
                first_stamp.0, first_stamp.1, start.0, start.1
            )));
        }
        let total_min = abs_minutes(end.0, end.1) - start_abs;
        if total_min <= 0 || total_min % step_min != 0 {
            return Err(PaError::HeaderCorrupt(format!(
                "simulation period ({} min) is not a positive integer multiple \
                 of the inferred step ({} min)",
                total_min, step_min
            )));
        }
        Ok(Self {
            start_date: start.0,
            start_time: start.1,
            start_abs,
            wide: start.0 >= 1_000_000,
            step_min,
            nsteps: (total_min / step_min) as usize,
        })
    }

    /// The inferred step in `HHMM` form.
    pub fn step_hhmm(&self) -> f32 {
        hhmm_of_minutes(self.step_min)
    }

    fn at(&self, minutes: i64) -> (i32, f32) {
        let days = minutes.div_euclid(1440);
        let tod = minutes.rem_euclid(1440);
        if tod == 0 && minutes > self.start_abs {
            // Day-boundary stamps are written as (date, 2400) by CAMx.
            (days_to_date(days - 1, self.wide), 2400.0)
        } else {
            (days_to_date(days, self.wide), hhmm_of_minutes(tod))
        }
    }

    /// Stamp carried by the data records of timestep `idx` (the end of the
    /// step): `start + (idx + 1) * step`.
    pub fn stamp(&self, idx: usize) -> (i32, f32) {
        self.at(self.start_abs + (idx as i64 + 1) * self.step_min)
    }

    /// All data stamps, `start+step ..= end`, in order.
    pub fn stamps(&self) -> impl Iterator<Item = (i32, f32)> + '_ {
        (0..self.nsteps).map(|i| self.stamp(i))
    }

    /// Step boundaries, `start ..= end` (`nsteps + 1` entries). Row 0 is the
    /// header start verbatim.
    pub fn boundary(&self, idx: usize) -> (i32, f32) {
        if idx == 0 {
            (self.start_date, self.start_time)
        } else {
            self.stamp(idx - 1)
        }
    }

    /// Exact lookup of a data stamp; no interpolation.
    pub fn index_of(&self, date: i32, time: f32) -> Result<usize> {
        let rel = abs_minutes(date, time) - self.start_abs;
        if rel > 0 && rel % self.step_min == 0 {
            let n = rel / self.step_min;
            if n >= 1 && n <= self.nsteps as i64 {
                return Ok((n - 1) as usize);
            }
        }
        Err(PaError::TimeNotFound { date, time })
    }
}
