//! The TOML schema, grounded on `arawn-config::types::ArawnConfig`: every
//! field optional so partial/layered config files merge cleanly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure, one `[section]` per concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IkigaiConfig {
    pub llm: Option<LlmSection>,
    pub agent: Option<AgentSection>,
    pub session: Option<SessionSection>,
    pub debug: Option<DebugSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub scrollback_capacity: Option<usize>,
    pub max_tool_iterations: Option<u32>,
    pub sigterm_grace_ms: Option<u64>,
    pub tool_paths: Option<Vec<PathBuf>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSection {
    pub pipes_enabled: Option<bool>,
}

impl IkigaiConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// `other` takes priority over `self` (spec-equivalent to
    /// `arawn-config`'s layered `merge`).
    pub fn merge(&mut self, other: IkigaiConfig) {
        merge_section(&mut self.llm, other.llm, |dst, src| {
            if src.model.is_some() {
                dst.model = src.model;
            }
            if src.base_url.is_some() {
                dst.base_url = src.base_url;
            }
        });
        merge_section(&mut self.agent, other.agent, |dst, src| {
            if src.scrollback_capacity.is_some() {
                dst.scrollback_capacity = src.scrollback_capacity;
            }
            if src.max_tool_iterations.is_some() {
                dst.max_tool_iterations = src.max_tool_iterations;
            }
            if src.sigterm_grace_ms.is_some() {
                dst.sigterm_grace_ms = src.sigterm_grace_ms;
            }
            if src.tool_paths.is_some() {
                dst.tool_paths = src.tool_paths;
            }
        });
        merge_section(&mut self.session, other.session, |dst, src| {
            if src.database_path.is_some() {
                dst.database_path = src.database_path;
            }
        });
        merge_section(&mut self.debug, other.debug, |dst, src| {
            if src.pipes_enabled.is_some() {
                dst.pipes_enabled = src.pipes_enabled;
            }
        });
    }
}

fn merge_section<T: Default>(dst: &mut Option<T>, src: Option<T>, apply: impl FnOnce(&mut T, T)) {
    if let Some(src) = src {
        apply(dst.get_or_insert_with(T::default), src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layer_overrides_earlier_fields() {
        let mut base = IkigaiConfig::from_toml("[llm]\nmodel = \"gemini-1.5-pro\"\n").unwrap();
        let override_layer =
            IkigaiConfig::from_toml("[llm]\nbase_url = \"http://localhost:9999\"\n").unwrap();
        base.merge(override_layer);
        let llm = base.llm.unwrap();
        assert_eq!(llm.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(llm.base_url.as_deref(), Some("http://localhost:9999"));
    }

    #[test]
    fn later_layer_replaces_earlier_scalar() {
        let mut base = IkigaiConfig::from_toml("[agent]\nmax_tool_iterations = 25\n").unwrap();
        let override_layer = IkigaiConfig::from_toml("[agent]\nmax_tool_iterations = 5\n").unwrap();
        base.merge(override_layer);
        assert_eq!(base.agent.unwrap().max_tool_iterations, Some(5));
    }
}
