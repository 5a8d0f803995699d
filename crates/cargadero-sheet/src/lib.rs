pub mod errors;
pub mod model;
mod readers;

pub use errors::{ParseError, ReaderAttempt};
pub use model::{Cell, Row, Sheet};
pub use readers::parse_sheet;
