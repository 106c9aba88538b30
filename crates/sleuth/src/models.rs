//! These models represent the objects passed around by the agent
//!
//! The conversation is kept in an internal format and only converted to the
//! chat-completions wire format at the provider boundary, see `providers::utils`.
pub mod message;
pub mod role;
pub mod tool;
