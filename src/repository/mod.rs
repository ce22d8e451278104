//! Persistence adapter. The repositories here are the only code aware of the
//! external row schema; everything else exchanges domain structs.

pub mod sqlite;

pub use sqlite::{JobRepository, ReportRepository, ResultRepository};
