/// Agent configuration.
pub mod agent;
mod agent_tests;
pub mod reader;

pub use agent::{AgentConfig, ConsumerConfig, ConsumerKind, SourceConfig, TelemetryConfig};
pub use reader::{Validatable, YamlConfig};
