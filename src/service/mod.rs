//! # Node and Channel Façade
//!
//! The interface boundary toward the relay/broadcast state machine.
//!
//! The protocol core does not drive channel state; it provides the
//! handles the surrounding logic composes with the Atom codec and the
//! transport layer:
//!
//! - **RelayNode**: per-process instance, YP announce endpoint, channel
//!   registry with idempotent relay start
//! - **Channel**: status cell, retained data window, output sinks

pub mod channel;
pub mod node;

pub use channel::{Channel, ChannelStatus, ContentSink, SinkId};
pub use node::RelayNode;
