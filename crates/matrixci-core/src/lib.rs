//! matrixci core
//!
//! Domain types and error handling shared by the matrixci crates: the
//! workflow definition, triggering events, job and run results.

pub mod error;
pub mod events;
pub mod ids;
pub mod run;
pub mod workflow;

pub use error::{Error, Result};
pub use ids::*;
