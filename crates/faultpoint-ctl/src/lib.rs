//! Command-line driver for faultpoint.
//!
//! - **[`demo`]**: an instrumented block store used as the target workload
//! - **[`script`]**: runs control commands line by line
//! - **[`report`]**: human-readable statistics

pub mod demo;
pub mod report;
pub mod script;
