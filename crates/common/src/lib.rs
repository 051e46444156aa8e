//! Runtime setup shared by the toolkit binaries.

mod logging;

pub use logging::{init_logging, init_logging_with, LogFormat, ParseLogFormatError};
