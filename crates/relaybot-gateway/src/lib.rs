//! relaybot-gateway — HTTP front door of the root bot
//!
//! Receives activities from channels on `/api/messages` and skill callbacks
//! on `/api/skills/...`, and runs each conversation's turns one at a time.

pub mod protocol;
pub mod server;
pub mod session;
pub mod skill_handler;

pub use server::{GatewayServer, GatewayState};
