pub mod capture;
pub mod models;
pub mod processing;
pub mod utils;
pub mod validation;
pub mod verification;

#[cfg(test)]
mod testing;

pub use models::VerificationConfig;
pub use utils::VerificationError;
pub use verification::VerificationSession;
