//! Common types shared by every aqms-ir crate.
//!
//! - [`epoch`]: validity intervals and timestamp parsing
//! - [`inventory`]: the Inventory capability model (network → station →
//!   channel → response stage) that StationXML readers produce
//! - [`rows`]: relational row shapes for the AQMS tables
//! - [`keys`]: natural keys identifying versioned entities

pub mod epoch;
pub mod error;
pub mod inventory;
pub mod keys;
pub mod rows;

pub use epoch::{format_timestamp, parse_timestamp, Epoch, Timestamp};
pub use error::{EpochError, EpochResult};
pub use inventory::{
    Channel, Coefficients, Complex, Decimation, Fir, Inventory, Network, PolesZeros, Response,
    ResponseStage, Sensitivity, StageTransfer, Station,
};
pub use keys::{ChannelKey, EntityKind, StationKey};
pub use rows::{
    coalesce, ChannelRecord, ChannelRow, DecimationRow, EpochRow, NetworkRow, RowCandidate,
    SimpleResponse, StageRow, StationRow, TransferRow,
};
