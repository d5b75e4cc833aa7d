//! # dr-sweep
//!
//! Grid expansion and run-path naming for Drover sweeps.
//!
//! [`Sweeper`] turns a [`dr_types::SweepSpec`] plus default parameters into an
//! ordered list of run configurations; [`RunNamer`] decides where each run's
//! output lands.

mod naming;
mod sweeper;

pub use naming::{prefix_date, RunNamer, RunNaming, TimeMode, DATESTAMP_FORMAT, TIMESTAMP_FORMAT};
pub use sweeper::{expand, Sweeper};
