mod base;

pub use base::{PreparedStatement, ReadResponse, SourceClient};
