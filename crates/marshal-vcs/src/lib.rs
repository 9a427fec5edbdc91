pub mod status;

pub use crate::status::{StatusCode, StatusEntry, StatusError, parse_porcelain};
