pub mod error;

pub use error::{ErrorCategory, VerificationError};
