//! `carrierlink-linkage`: carrier registry to insurance feed record linkage.
//!
//! Library crate: loads the policy feed into read-only key indices, streams
//! the registry through a recovery scanner, links each carrier by a fixed
//! strategy precedence, and writes matched rows plus the unclaimed residue.
//! No CLI dependencies.

pub mod config;
pub mod error;
pub mod insurance;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod scanner;
pub mod summary;
mod text;

pub use config::LinkConfig;
pub use error::LinkError;
pub use insurance::InsuranceIndex;
pub use matcher::Matcher;
pub use model::{CarrierRecord, InsuranceRecord, MatchDecision, MatchType};
pub use pipeline::{run, LinkPaths};
pub use scanner::RecoveryScanner;
pub use summary::LinkSummary;
