//! # bsp-auction - Superstep Auction Matching for Rust
//!
//! bsp-auction computes a maximum-weight bipartite matching with a distributed
//! epsilon-relaxation auction. Bidders and items are vertices that only talk
//! through messages; rounds are separated by a global barrier and a node
//! votes to halt once it has nothing left to do.
//!
//! ## Modules
//!
//! - [`auction`] - Node records, state, messages and the per-round step
//! - [`bsp`] - Round engine interface, convergence, job driver, checkpoints
//! - [`codec`] - Binary wire primitives
//! - [`error`] - Error types and handling
//! - [`config`] - Job configuration and config-file loading
//! - [`input`] - JSON-lines graph loader
//! - [`report`] - Final matching summary
//! - [`generate`] - Random instances
//!
//! ## Quick Start
//!
//! ```rust
//! use bsp_auction::*;
//! use rust_decimal::Decimal;
//!
//! let records = vec![
//!     NodeRecord::bidder("A", vec![Edge::new("X", 10.into()), Edge::new("Y", 8.into())]).unwrap(),
//!     NodeRecord::bidder("B", vec![Edge::new("X", 9.into()), Edge::new("Y", 7.into())]).unwrap(),
//!     NodeRecord::item("X").unwrap(),
//!     NodeRecord::item("Y").unwrap(),
//! ];
//! let config = JobConfig::new(Decimal::ONE, 100).unwrap();
//! let mut job = AuctionJob::new(records.clone(), config).unwrap();
//! let result = job.run(&mut LocalRoundEngine::new());
//!
//! assert_eq!(result.status, ConvergenceStatus::Converged);
//! assert_eq!(result.total_value(&records), Decimal::from(17));
//! ```

pub mod auction;
pub mod bsp;
pub mod codec;
pub mod config;
pub mod error;
pub mod generate;
pub mod input;
pub mod logger;
pub mod report;

pub use auction::*;
pub use bsp::*;
pub use config::JobConfig;
pub use error::*;
