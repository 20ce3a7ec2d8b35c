//! Converts MapReduce application names to actual application code.
//!
//! Only single-input applications are registered here. The join stage reads
//! two sources with different map functions and is wired up by
//! [`crate::pipeline`] instead.
//!
//! # Example
//!
//! To get the per-year count application:
//! ```
//! # use anyhow::Result;
//! use mrimdb::workload;
//! # fn main() -> Result<()> {
//! let counts = workload::named("year-count")?;
//! # Ok(())
//! # }
//! ```

use crate::Workload;
use anyhow::{bail, Result};

pub mod actor_years;

/// Gets the [`Workload`] named `name`.
///
/// Returns [`None`] if no application with the given name was found.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "year-count" => Some(Workload {
            map_fn: actor_years::map_facts,
            reduce_fn: actor_years::reduce_sum,
        }),
        _ => None,
    }
}

/// Gets the [`Workload`] named `name`.
///
/// Returns an [`anyhow::Error`] if no application with the given name was found.
pub fn named(name: &str) -> Result<Workload> {
    match try_named(name) {
        Some(app) => Ok(app),
        None => bail!("No app named `{}` found.", name),
    }
}
