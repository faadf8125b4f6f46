pub mod engine;
pub mod logging;
pub mod message;
pub mod state;
pub mod types;

pub use engine::{StepOutput, Vertex};
pub use message::{AuctionMessage, Envelope, Inbox, MessageKind};
pub use state::NodeState;
pub use types::*;
