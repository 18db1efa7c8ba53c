//! [`ToolDescriptor`]: the registry's unit of tool metadata (§3, §4.5).

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Static metadata about a tool, independent of any particular call.
///
/// A handler is registered separately (it is not `Serialize`); this struct
/// is what gets exported to the model as a provider-neutral JSON schema and
/// consulted by the dispatcher to decide parallel vs. serial scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    /// No side effects outside of what the args describe; safe to run
    /// concurrently with other tool calls in the same turn.
    pub readonly: bool,
    /// Stateless and side-effect free with respect to *other* tool calls.
    /// Readonly tools are always parallelizable; some non-readonly tools
    /// (e.g. independent file writes to disjoint paths) may also opt in.
    pub parallelizable: bool,
    pub arg_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, readonly: bool, parallelizable: bool, arg_schema: Value) -> Self {
        Self {
            name: name.into(),
            readonly,
            parallelizable,
            arg_schema,
        }
    }
}
