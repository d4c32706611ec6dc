//! FDSN StationXML support.
//!
//! Reads the subset of StationXML 1.1 that the AQMS schema stores
//! (Network, Station, Channel, Response with PolesZeros, Coefficients, FIR,
//! Decimation and gains) into [`aqms_common::Inventory`], and writes an
//! inventory back out.
//!
//! Elements outside that subset are skipped. Enumerated values are passed
//! through as written; validating them is the schema mapper's job.

pub mod error;
mod reader;
mod writer;

pub use error::{StationXmlError, StationXmlResult};
pub use reader::read_inventory;
pub use writer::write_inventory;
