//! Core: the agent orchestrator state machine, permission engine, tool
//! dispatcher, and supporting ambient infrastructure. Re-exports `agent_protocol`
//! so callers depend on one crate for the full public surface.

pub mod bus;
pub mod checkpoint;
pub mod compactor;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod freshness;
pub mod input_queue;
pub mod llm;
pub mod permissions;
pub mod registry;
pub mod runner;
pub mod stream;
pub mod subagent;
pub mod submission;
pub mod tools;
mod util;

pub use agent_protocol as protocol;

pub use bus::BusEvent;
pub use bus::EventBus;
pub use bus::EventType;
pub use checkpoint::Checkpointer;
pub use checkpoint::InMemoryCheckpointer;
pub use compactor::CompactorConfig;
pub use compactor::ContextCompactor;
pub use config::Config;
pub use dispatcher::DispatcherConfig;
pub use dispatcher::ToolDispatcher;
pub use error::CoreError;
pub use error::Result;
pub use freshness::FreshnessTracker;
pub use input_queue::InputQueue;
pub use llm::AssistantChunk;
pub use llm::HttpLlmClient;
pub use llm::LlmClient;
pub use llm::NullLlmClient;
pub use permissions::PermissionEngine;
pub use registry::ToolContext;
pub use registry::ToolHandler;
pub use registry::ToolRegistry;
pub use runner::AgentRunner;
pub use runner::AutoResolver;
pub use runner::ChannelInterruptResolver;
pub use runner::InterruptResolver;
pub use runner::RunOutcome;
pub use runner::RunnerState;
pub use stream::StreamWriter;
pub use subagent::AgentDescriptor;
pub use subagent::AgentDescriptorRegistry;
pub use subagent::SubAgentFactory;
pub use subagent::TaskHandler;
pub use submission::Classification;
pub use submission::SubmissionRouter;
pub use tools::register_builtin_tools;
pub use util::backoff;
