//! Dashboard chart data.

pub mod charts;
