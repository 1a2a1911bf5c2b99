pub mod date;
pub mod upload;

pub use date::{calculate_age, parse_date_of_birth};
pub use upload::validate_document_upload;
