//! Dialogue orchestration for CybVector.
//!
//! This crate ties together the hygiene quiz, threat-intel lookups, and model
//! completion into a per-session conversation (see [`DialogueController`]).

pub mod dialogue;
pub mod prompts;
pub mod session;

pub use dialogue::{DialogueController, Turn, classify};
pub use session::{InMemorySessionStore, Session, SessionHandle, SessionStore};
