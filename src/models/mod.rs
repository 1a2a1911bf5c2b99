pub mod config;
pub mod data;
pub mod reference;

pub use config::*;
pub use data::*;
pub use reference::{Misreading, ReferenceCorpus, ReferenceName};
