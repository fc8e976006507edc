//! Parley Engine Library
//!
//! This library provides the core functionality of the Parley engine:
//! a turn-based debate between two configurable bots, refereed by a
//! facilitator that periodically decides whether the exchange should
//! continue. It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Error types shared across the engine
pub mod error;

/// Conversation data model and state store
pub mod chat;

/// Quota governor bounding unsupervised bot turns
pub mod quota;

/// Per-viewer message view transformation
pub mod view;

/// LLM provider abstraction layer
pub mod llm;

/// Facilitator judge module
pub mod facilitator;

/// Turn scheduler driving the conversation state machine
pub mod scheduler;

/// Bot template bank
pub mod bank;

/// Backup and restore of conversation state
pub mod backup;

/// Event bus for state-change notifications
pub mod events;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
