//! Sub-Agent (Task) Tool (C9, §4.9) and the Markdown front-matter loader for
//! sub-agent descriptors (§6).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;

use agent_protocol::AgentState;
use agent_protocol::Message;
use agent_protocol::ToolResult;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::checkpoint::Checkpointer;
use crate::dispatcher::DispatcherConfig;
use crate::dispatcher::ToolDispatcher;
use crate::dispatcher::TASK_TOOL_NAME;
use crate::llm::LlmClient;
use crate::permissions::PermissionEngine;
use crate::registry::ToolContext;
use crate::registry::ToolHandler;
use crate::registry::ToolRegistry;
use crate::runner::AgentRunner;
use crate::runner::InterruptResolver;
use crate::runner::RunOutcome;

pub const BUILTIN_AGENT_NAME: &str = "general-purpose";

/// A sub-agent's fixed configuration (§6: system prompt, tool subset,
/// model). `tools: None` means "all registered tools" (the `*` front-matter
/// value).
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDescriptor {
    pub agent_name: String,
    pub description: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    #[serde(default)]
    pub model: Option<String>,
}

impl AgentDescriptor {
    fn builtin() -> Self {
        Self {
            agent_name: BUILTIN_AGENT_NAME.to_string(),
            description: "General-purpose agent with access to all registered tools.".to_string(),
            system_prompt: None,
            tools: None,
            model: None,
        }
    }
}

/// Loads sub-agent descriptors from `<home>/.ai_dev/agents` and
/// `<project>/.ai_dev/agents`, with project overriding user overriding the
/// unconditional built-in `general-purpose` agent (§6).
#[derive(Default)]
pub struct AgentDescriptorRegistry {
    descriptors: HashMap<String, AgentDescriptor>,
}

impl AgentDescriptorRegistry {
    pub fn load(project_root: &Path, home: Option<&Path>) -> std::io::Result<Self> {
        let mut descriptors = HashMap::new();
        descriptors.insert(BUILTIN_AGENT_NAME.to_string(), AgentDescriptor::builtin());

        if let Some(home) = home {
            load_dir_into(&home.join(".ai_dev").join("agents"), &mut descriptors)?;
        }
        load_dir_into(&project_root.join(".ai_dev").join("agents"), &mut descriptors)?;

        Ok(Self { descriptors })
    }

    /// Convenience over [`Self::load`] that resolves the user's home
    /// directory (`dirs::home_dir`) instead of requiring the caller to pass
    /// one explicitly.
    pub fn load_with_default_home(project_root: &Path) -> std::io::Result<Self> {
        Self::load(project_root, dirs::home_dir().as_deref())
    }

    pub fn get(&self, agent_name: &str) -> Option<&AgentDescriptor> {
        self.descriptors.get(agent_name)
    }
}

fn load_dir_into(dir: &Path, out: &mut HashMap<String, AgentDescriptor>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let raw = std::fs::read_to_string(&path)?;
        match parse_front_matter(&raw) {
            Some(descriptor) => {
                out.insert(descriptor.agent_name.clone(), descriptor);
            }
            None => {
                tracing::warn!(path = %path.display(), "sub-agent config missing or malformed front matter, skipping");
            }
        }
    }
    Ok(())
}

/// Hand-split `---`-delimited front matter, parsed as YAML (§6: no
/// dedicated front-matter crate; `serde_yaml` is already in the stack).
fn parse_front_matter(raw: &str) -> Option<AgentDescriptor> {
    let rest = raw.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    let yaml = &rest[..end];
    serde_yaml::from_str(yaml).ok()
}

/// Constructed once per process and shared by every `Task` handler
/// invocation; it is how the handler gets at the ingredients for building a
/// child [`AgentRunner`] without the tool-registry carrying a reference to
/// itself.
pub struct SubAgentFactory {
    pub descriptors: Arc<AgentDescriptorRegistry>,
    pub registry: ToolRegistry,
    pub llm: Arc<dyn LlmClient>,
    pub permissions: Arc<PermissionEngine>,
    pub checkpointer: Arc<dyn Checkpointer>,
    pub resolver: Arc<dyn InterruptResolver>,
    pub bus: EventBus,
    pub dispatcher_config_max_task_slots: usize,
    pub recursion_limit: u64,
    pub next_child_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct TaskArgs {
    #[allow(dead_code)]
    description: String,
    prompt: String,
    agent_name: String,
}

pub struct TaskHandler {
    factory: Arc<SubAgentFactory>,
}

impl TaskHandler {
    pub fn new(factory: Arc<SubAgentFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ToolHandler for TaskHandler {
    async fn invoke(&self, args: Value, ctx: ToolContext) -> anyhow::Result<ToolResult> {
        let args: TaskArgs = serde_json::from_value(args)?;
        let descriptor = self
            .factory
            .descriptors
            .get(&args.agent_name)
            .ok_or_else(|| anyhow::anyhow!("unknown sub-agent: {}", args.agent_name))?
            .clone();

        let allowed_tools = descriptor.tools.clone().unwrap_or_else(|| vec!["*".to_string()]);
        let child_registry = self
            .factory
            .registry
            .restricted_excluding(&allowed_tools, TASK_TOOL_NAME);

        let child_id = format!(
            "{}-task-{}",
            ctx.agent_id,
            self.factory.next_child_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
        );
        let child_stream = ctx.stream.for_source(&child_id);

        let mut messages = Vec::new();
        if let Some(system_prompt) = &descriptor.system_prompt {
            messages.push(Message::system(system_prompt.clone()));
        }
        messages.push(Message::user(args.prompt));

        let state = AgentState {
            messages,
            pending_tool_calls: Vec::new(),
            iteration: 0,
            agent_id: child_id.clone(),
            user_canceled: false,
            working_directory: ctx.cwd.clone(),
            pending_interrupt: None,
        };

        let dispatcher = ToolDispatcher::new(
            child_registry,
            DispatcherConfig { max_task_slots: self.factory.dispatcher_config_max_task_slots },
        );

        let runner = AgentRunner::new(
            Arc::clone(&self.factory.llm),
            dispatcher,
            Arc::clone(&self.factory.permissions),
            Arc::clone(&self.factory.checkpointer),
            Arc::clone(&self.factory.resolver),
            self.factory.bus.clone(),
            self.factory.recursion_limit,
        );

        let outcome = runner.run(state, child_stream, Arc::new(AtomicBool::new(false)), None).await?;

        match outcome {
            RunOutcome::Completed { last_assistant_text: Some(text) } => Ok(ToolResult::text(text)),
            RunOutcome::Completed { last_assistant_text: None } => {
                Ok(ToolResult::text("sub-agent terminated without a final assistant message"))
            }
            RunOutcome::Canceled => Ok(ToolResult::text("user canceled")),
        }
    }
}

pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_matter_parses_minimal_descriptor() {
        let raw = "---\nagent_name: reviewer\ndescription: reviews diffs\n---\nbody text\n";
        let descriptor = parse_front_matter(raw).unwrap();
        assert_eq!(descriptor.agent_name, "reviewer");
        assert!(descriptor.tools.is_none());
    }

    #[test]
    fn missing_front_matter_returns_none() {
        assert!(parse_front_matter("no front matter here").is_none());
    }

    #[test]
    fn builtin_agent_always_present() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AgentDescriptorRegistry::load(dir.path(), None).unwrap();
        assert!(registry.get(BUILTIN_AGENT_NAME).is_some());
    }

    #[test]
    fn project_descriptor_overrides_builtin_name_collision() {
        let dir = tempfile::tempdir().unwrap();
        let agents_dir = dir.path().join(".ai_dev").join("agents");
        std::fs::create_dir_all(&agents_dir).unwrap();
        std::fs::write(
            agents_dir.join("general-purpose.md"),
            "---\nagent_name: general-purpose\ndescription: overridden\n---\n",
        )
        .unwrap();

        let registry = AgentDescriptorRegistry::load(dir.path(), None).unwrap();
        assert_eq!(registry.get(BUILTIN_AGENT_NAME).unwrap().description, "overridden");
    }
}
