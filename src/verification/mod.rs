pub mod orchestrator;
pub mod session;

pub use orchestrator::{decide, VerificationSession};
pub use session::SessionStore;
