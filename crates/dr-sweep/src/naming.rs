//! Deterministic output-path naming for the runs of a sweep.

use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Clock format used in timestamped run ids, e.g. `14h-03m-59s`.
pub const TIMESTAMP_FORMAT: &str = "%Hh-%Mm-%Ss";

/// Date format used when prefixing a log path with the launch date.
pub const DATESTAMP_FORMAT: &str = "%y-%m-%d";

/// Whether runs share one output root or each get a subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunNaming {
    /// Every run writes to the base path. Collisions are the method's problem.
    #[default]
    Flat,
    /// `base/run<N>` per run.
    PerRun,
}

/// Where the timestamp goes relative to the run token in per-run naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeMode {
    None,
    /// `<time>_run<N>`
    Prefix,
    /// `run<N>_<time>`
    #[default]
    Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunNamer {
    pub naming: RunNaming,
    pub time_mode: TimeMode,
    /// Added to every run index, so a sweep can continue an earlier one.
    pub start_offset: usize,
}

impl RunNamer {
    pub fn flat() -> Self {
        Self {
            naming: RunNaming::Flat,
            time_mode: TimeMode::None,
            start_offset: 0,
        }
    }

    pub fn per_run(start_offset: usize) -> Self {
        Self {
            naming: RunNaming::PerRun,
            time_mode: TimeMode::None,
            start_offset,
        }
    }

    pub fn with_time_mode(mut self, time_mode: TimeMode) -> Self {
        self.time_mode = time_mode;
        self
    }

    /// Run token (`run7`, `run7_09h-05m-03s`, ...) or `None` in flat mode.
    ///
    /// The run number is always part of the token, so tokens stay unique per
    /// index even when two runs share a timestamp.
    pub fn run_id(&self, run_index: usize, time: NaiveTime) -> Option<String> {
        if self.naming == RunNaming::Flat {
            return None;
        }
        let number = self.start_offset + run_index;
        let id = match self.time_mode {
            TimeMode::None => format!("run{number}"),
            TimeMode::Prefix => format!("{}_run{number}", time.format(TIMESTAMP_FORMAT)),
            TimeMode::Suffix => format!("run{number}_{}", time.format(TIMESTAMP_FORMAT)),
        };
        Some(id)
    }

    /// Output path of run `run_index` under `base` at the given time of day.
    pub fn path_at(&self, base: &str, run_index: usize, time: NaiveTime) -> String {
        match self.run_id(run_index, time) {
            None => base.to_string(),
            Some(id) => {
                let trimmed = base.trim_end_matches('/');
                let root = if trimmed.is_empty() && base.starts_with('/') {
                    ""
                } else {
                    trimmed
                };
                format!("{root}/{id}")
            }
        }
    }

    /// [`RunNamer::path_at`] using the local wall clock.
    pub fn path(&self, base: &str, run_index: usize) -> String {
        self.path_at(base, run_index, Local::now().time())
    }
}

/// `my-exp` launched on 2024-03-09 becomes `24-03-09_my-exp`.
pub fn prefix_date(log_path: &str, date: NaiveDate) -> String {
    format!("{}_{log_path}", date.format(DATESTAMP_FORMAT))
}
