//! Small helpers shared by the feed pipeline.
//!
//! - **URL validation**: which feed URLs the HTTP transport may request
//! - **Dates**: lenient parsing of publisher timestamps

mod dates;
mod url_validator;

pub use dates::parse_timestamp;
pub use url_validator::{UrlPolicy, UrlValidationError};
