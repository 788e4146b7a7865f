//! Shared wire surface for the Kao avatar relay.
//!
//! Everything a client of the relay can see lives here: the expression
//! vocabulary, the pub/sub wire messages exchanged over WebSocket, the
//! GitHub webhook payload shapes, and the HMAC signature scheme used to
//! authenticate webhook deliveries.

pub mod expression;
pub mod github;
pub mod messages;
pub mod signature;

pub use expression::{Expression, Priority, UnknownExpression};
pub use messages::{Channel, ControlFrame, WireBody, WireMessage};
