//! Codedrop: a local agent that watches the system clipboard for triggered
//! file payloads from AI chat sessions, writes them into a project tree,
//! validates the build, and commits the result under a configurable git
//! policy.

pub mod agent;
pub mod builder;
pub mod changelog;
pub mod channel;
pub mod errors;
pub mod feedback;
pub mod monitor;
pub mod payload;
pub mod settings;
pub mod vcs;
pub mod writer;
