//! These models represent the objects passed around by the engine
//!
//! There are a few related formats the engine has to interact with:
//! - openai-style chat messages and tool specs, sent to the model provider
//! - tool definitions and content envelopes, exchanged over the bridge
//! - the event wire shape, sent from the engine to a presentation layer
//!
//! Incoming and outgoing data is converted to and from these internal
//! structs at the edges; nothing outside the provider wire module should
//! need to know any external format.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
