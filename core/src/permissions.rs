//! Permission Engine (C4, §4.4): declarative allow/deny/ask rules with
//! session caching and per-tool argument-pattern matching.
//!
//! The engine is pure with respect to its arguments; the session cache is
//! the only mutable state and resets with the session (§4.4).

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use agent_protocol::PermissionDecision;
use agent_protocol::PermissionRequest;
use agent_protocol::UserChoice;
use serde_json::Value;
use wildmatch::WildMatch;

/// A compiled permission rule. Parsed once at engine construction from the
/// `"ToolName"` / `"ToolName(pattern)"` grammar of §4.4.
#[derive(Debug, Clone)]
enum Rule {
    /// The literal rule string `"*"`: matches every invocation.
    MatchAll,
    ToolOnly(String),
    WithPattern { tool: String, pattern: String },
}

fn parse_rule(raw: &str) -> Rule {
    let raw = raw.trim();
    if raw == "*" {
        return Rule::MatchAll;
    }
    if let Some(open) = raw.find('(') {
        if let Some(pattern) = raw.strip_suffix(')').and_then(|s| s.get(open + 1..)) {
            return Rule::WithPattern {
                tool: raw[..open].to_string(),
                pattern: pattern.to_string(),
            };
        }
    }
    Rule::ToolOnly(raw.to_string())
}

fn rule_matches(rule: &Rule, tool_name: &str, args: &Value, cwd: &Path) -> bool {
    match rule {
        Rule::MatchAll => true,
        Rule::ToolOnly(name) => name == tool_name,
        Rule::WithPattern { tool, pattern } => {
            if tool != tool_name {
                return false;
            }
            if tool_name == "Shell" {
                match_shell_pattern(pattern, args)
            } else {
                match_path_pattern(pattern, args, cwd)
            }
        }
    }
}

fn shell_command_tokens(args: &Value) -> Vec<String> {
    if let Some(arr) = args.get("command").and_then(Value::as_array) {
        return arr.iter().filter_map(Value::as_str).map(str::to_string).collect();
    }
    if let Some(s) = args.get("command").and_then(Value::as_str) {
        return s.split_whitespace().map(str::to_string).collect();
    }
    Vec::new()
}

fn match_shell_pattern(pattern: &str, args: &Value) -> bool {
    let (cmd_part, glob_part) = match pattern.split_once(':') {
        Some((c, g)) => (c, g),
        None => (pattern, "*"),
    };
    let tokens = shell_command_tokens(args);
    let Some(first) = tokens.first() else {
        return false;
    };
    if cmd_part != "*" && cmd_part != first {
        return false;
    }
    WildMatch::new(glob_part).matches(&tokens.join(" "))
}

fn match_path_pattern(pattern: &str, args: &Value, cwd: &Path) -> bool {
    let Some(path) = args.get("path").and_then(Value::as_str) else {
        return false;
    };
    let path = Path::new(path);
    let display = path.strip_prefix(cwd).unwrap_or(path).to_string_lossy().replace('\\', "/");
    WildMatch::new(pattern).matches(&display)
}

/// Fingerprint used as the session-cache key (§3): deterministic per
/// (tool, args) so repeat invocations of the "same" operation share a
/// cached decision.
fn fingerprint(tool_name: &str, args: &Value, cwd: &Path) -> String {
    if tool_name == "Shell" {
        let tokens = shell_command_tokens(args);
        let first = tokens.first().map(String::as_str).unwrap_or("*");
        return format!("Shell({first}:*)");
    }
    if let Some(path) = args.get("path").and_then(Value::as_str) {
        let path = Path::new(path);
        let display = path.strip_prefix(cwd).unwrap_or(path).to_string_lossy().replace('\\', "/");
        return format!("{tool_name}({display})");
    }
    tool_name.to_string()
}

pub struct PermissionEngine {
    allow: Vec<Rule>,
    deny: Vec<Rule>,
    session_cache: Mutex<HashSet<String>>,
}

impl PermissionEngine {
    pub fn new(allow: &[String], deny: &[String]) -> Self {
        Self {
            allow: allow.iter().map(|s| parse_rule(s)).collect(),
            deny: deny.iter().map(|s| parse_rule(s)).collect(),
            session_cache: Mutex::new(HashSet::new()),
        }
    }

    /// Evaluation order (§4.4): session cache, then deny, then allow, else
    /// ask. There is no separate `ask[]` rule list to consult — a
    /// configured `ask` entry only documents intent; the decision always
    /// falls out of the deny/allow rules and the implicit else-Ask default.
    pub fn check(&self, tool_name: &str, args: &Value, cwd: &Path) -> (PermissionDecision, PermissionRequest) {
        let key = fingerprint(tool_name, args, cwd);
        let request = PermissionRequest {
            tool_name: tool_name.to_string(),
            args: args.clone(),
            cwd: cwd.to_path_buf(),
            permission_key: key.clone(),
        };

        if self.session_cache.lock().unwrap_or_else(|p| p.into_inner()).contains(&key) {
            return (PermissionDecision::Allow, request);
        }
        if self.deny.iter().any(|r| rule_matches(r, tool_name, args, cwd)) {
            return (PermissionDecision::Deny, request);
        }
        if self.allow.iter().any(|r| rule_matches(r, tool_name, args, cwd)) {
            return (PermissionDecision::Allow, request);
        }
        (PermissionDecision::Ask, request)
    }

    pub fn apply_user_choice(&self, request: &PermissionRequest, choice: UserChoice) -> PermissionDecision {
        match choice {
            UserChoice::AllowOnce => PermissionDecision::Allow,
            UserChoice::AllowSession => {
                self.session_cache
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .insert(request.permission_key.clone());
                PermissionDecision::Allow
            }
            UserChoice::Deny => PermissionDecision::Deny,
        }
    }

    pub fn clear_session_cache(&self) {
        self.session_cache.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}
