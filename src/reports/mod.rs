//! Report generators for triage results.
//!
//! Three outputs, mirroring how the results get consumed: CSV for
//! spreadsheets, JSON for dashboards, and a text summary for the terminal.

mod csv;
mod json;
mod summary;

pub use csv::render_csv;
pub use json::render_json;
pub use summary::render_summary;
