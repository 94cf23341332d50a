//! Engine settings, one struct per concern.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult, EnvOverrides, SessionConfig, ValidationErrors};

pub const DEFAULT_FINISH_MARKER: &str = "[FINISH]";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Upper bound on THINKING steps per task.
    pub max_iterations: usize,
    /// Structured tool calls; when false the `Action:` text protocol is used.
    pub tool_calling: bool,
    pub finish_marker: String,
    /// Ask the model for a plan before the first step of each task.
    pub planning: bool,
    pub system_prompt: Option<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tool_calling: true,
            finish_marker: DEFAULT_FINISH_MARKER.to_string(),
            planning: false,
            system_prompt: None,
        }
    }
}

impl LoopConfig {
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tool_calling(mut self, enabled: bool) -> Self {
        self.tool_calling = enabled;
        self
    }

    pub fn with_finish_marker(mut self, marker: impl Into<String>) -> Self {
        self.finish_marker = marker.into();
        self
    }

    pub fn with_planning(mut self, enabled: bool) -> Self {
        self.planning = enabled;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    pub enabled: bool,
    pub max_messages: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_messages: 20,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts for transient tool failures.
    pub max_retries: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 1000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Maximum observation length in characters.
    pub max_length: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self { max_length: 10_000 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopGuardConfig {
    pub threshold: usize,
    pub window_size: usize,
}

impl Default for LoopGuardConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            window_size: 6,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Upper bound on supervisor decisions per task.
    pub max_total_iterations: usize,
    pub finish_marker: String,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            max_total_iterations: 16,
            finish_marker: DEFAULT_FINISH_MARKER.to_string(),
        }
    }
}

impl TeamConfig {
    pub fn with_max_total_iterations(mut self, max: usize) -> Self {
        self.max_total_iterations = max;
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(rename = "loop")]
    pub agent_loop: LoopConfig,
    pub compaction: CompactionConfig,
    pub retry: RetryConfig,
    pub sanitizer: SanitizerConfig,
    pub loop_guard: LoopGuardConfig,
    pub team: TeamConfig,
    pub session: SessionConfig,
}

impl EngineConfig {
    pub fn from_json_str(data: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let data = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&data)
    }

    /// Layer `<prefix><KEY>` environment variables over this config.
    pub fn with_env_overrides(self, prefix: &str) -> ConfigResult<Self> {
        EnvOverrides::new(prefix).apply(self, |key| std::env::var(key).ok())
    }

    pub fn with_loop(mut self, config: LoopConfig) -> Self {
        self.agent_loop = config;
        self
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn with_compaction(mut self, config: CompactionConfig) -> Self {
        self.compaction = config;
        self
    }

    pub fn with_loop_guard(mut self, config: LoopGuardConfig) -> Self {
        self.loop_guard = config;
        self
    }

    pub fn with_team(mut self, config: TeamConfig) -> Self {
        self.team = config;
        self
    }

    /// Collects every invalid value instead of stopping at the first one.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut positive = |key: &str, value: usize| {
            if value == 0 {
                errors.push(ConfigError::invalid(key, "must be at least 1"));
            }
        };

        positive("loop.max_iterations", self.agent_loop.max_iterations);
        positive("compaction.max_messages", self.compaction.max_messages);
        positive("retry.max_retries", self.retry.max_retries as usize);
        positive("sanitizer.max_length", self.sanitizer.max_length);
        positive("loop_guard.threshold", self.loop_guard.threshold);
        positive("loop_guard.window_size", self.loop_guard.window_size);
        positive("team.max_total_iterations", self.team.max_total_iterations);
        positive("session.max_history", self.session.max_history);

        if self.loop_guard.threshold > self.loop_guard.window_size {
            errors.push(ConfigError::invalid(
                "loop_guard.threshold",
                format!(
                    "threshold {} exceeds window size {}",
                    self.loop_guard.threshold, self.loop_guard.window_size
                ),
            ));
        }
        if self.agent_loop.finish_marker.trim().is_empty() {
            errors.push(ConfigError::invalid("loop.finish_marker", "must not be empty"));
        }
        if self.team.finish_marker.trim().is_empty() {
            errors.push(ConfigError::invalid("team.finish_marker", "must not be empty"));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::ValidationErrors(ValidationErrors(errors))),
        }
    }
}
