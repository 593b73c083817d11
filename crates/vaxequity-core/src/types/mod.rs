//! Country data model: raw observations and the reconciled table

mod country;
mod table;

pub use country::{CountryObservation, CountryRecord};
pub use table::{CountryTable, IngestReport};
