//! Live voice demo widget: talk to a remote AI agent over a real-time voice
//! session, or ask the agent to call you back.

pub mod app;
pub mod audio;
pub mod callback;
pub mod config;
pub mod session;
