//! Data models for COVID-19 statistics.
//!
//! - `RawRecord`: one observation as returned by the upstream API
//! - `TotalRow`, `StateRow`: display-ready rows with derived percentages
//! - `HeaderDescriptor`: table column metadata
//! - Region directory: two-letter code to full region name

pub mod header;
pub mod record;
pub mod region;
pub mod row;

pub use header::{build_headers, HeaderDescriptor, SortDirection};
pub use record::{ItemsResponse, RawRecord};
pub use region::{region_name, regions, RegionDirectory};
pub use row::{sort_rows, Cell, DisplayRows, Percentage, StateRow, TableRow, TotalRow};
