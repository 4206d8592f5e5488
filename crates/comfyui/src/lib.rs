//! ComfyUI WebSocket and REST client library.
//!
//! Submits workflow graphs to a ComfyUI server, waits on the WebSocket
//! for the completion notification of a specific prompt, then pulls the
//! prompt history and downloads every output image.
//!
//! [`runner::JobRunner`] ties the pieces together for one job cycle.

pub mod api;
pub mod client;
pub mod events;
pub mod history;
pub mod messages;
pub mod runner;
pub mod wait;
pub mod workflow;
