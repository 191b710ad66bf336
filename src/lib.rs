//! gdxstore: Versioned Storage of Simulation Results
//!
//! Archives generated result files in a git-backed storage root, one folder
//! per source commit, after checking that each result was computed from the
//! code it claims to belong to.

pub mod clock;
pub mod compare;
pub mod config;
pub mod error;
pub mod index;
pub mod inspect;
pub mod logging;
pub mod operator;
pub mod patch;
pub mod pipeline;
pub mod provenance;
pub mod storage;
pub mod timing;
pub mod tooling;
pub mod vcs;

pub use error::{ApiError, StoreError};
pub use pipeline::{store, StorePipeline, StoreReceipt, StoreRequest, StoreSettings};
