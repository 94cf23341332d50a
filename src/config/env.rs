//! Environment variable overrides.
//!
//! Variables are read, never written: mutating the process environment is not
//! thread-safe. Tests pass their own lookup to [`EnvOverrides::apply`].

use std::str::FromStr;

use super::{ConfigError, ConfigResult, EngineConfig};

/// Recognized keys, appended to the prefix (e.g. `AGENTLOOP_MAX_ITERATIONS`).
pub const ENV_KEYS: &[&str] = &[
    "MAX_ITERATIONS",
    "TOOL_CALLING",
    "FINISH_MARKER",
    "PLANNING",
    "SYSTEM_PROMPT",
    "COMPACTION_ENABLED",
    "COMPACTION_MAX_MESSAGES",
    "RETRY_MAX_RETRIES",
    "RETRY_DELAY_MS",
    "SANITIZER_MAX_LENGTH",
    "LOOP_GUARD_THRESHOLD",
    "LOOP_GUARD_WINDOW_SIZE",
    "TEAM_MAX_TOTAL_ITERATIONS",
    "SESSION_MAX_HISTORY",
];

#[derive(Debug, Clone)]
pub struct EnvOverrides {
    prefix: String,
}

impl EnvOverrides {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn env_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn apply<F>(&self, mut config: EngineConfig, lookup: F) -> ConfigResult<EngineConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(&self.env_key(key)).map(|v| (self.env_key(key), v));

        if let Some((k, v)) = get("MAX_ITERATIONS") {
            config.agent_loop.max_iterations = parse(&k, &v)?;
        }
        if let Some((k, v)) = get("TOOL_CALLING") {
            config.agent_loop.tool_calling = parse_bool(&k, &v)?;
        }
        if let Some((_, v)) = get("FINISH_MARKER") {
            config.agent_loop.finish_marker = v.clone();
            config.team.finish_marker = v;
        }
        if let Some((k, v)) = get("PLANNING") {
            config.agent_loop.planning = parse_bool(&k, &v)?;
        }
        if let Some((_, v)) = get("SYSTEM_PROMPT") {
            config.agent_loop.system_prompt = Some(v);
        }
        if let Some((k, v)) = get("COMPACTION_ENABLED") {
            config.compaction.enabled = parse_bool(&k, &v)?;
        }
        if let Some((k, v)) = get("COMPACTION_MAX_MESSAGES") {
            config.compaction.max_messages = parse(&k, &v)?;
        }
        if let Some((k, v)) = get("RETRY_MAX_RETRIES") {
            config.retry.max_retries = parse(&k, &v)?;
        }
        if let Some((k, v)) = get("RETRY_DELAY_MS") {
            config.retry.delay_ms = parse(&k, &v)?;
        }
        if let Some((k, v)) = get("SANITIZER_MAX_LENGTH") {
            config.sanitizer.max_length = parse(&k, &v)?;
        }
        if let Some((k, v)) = get("LOOP_GUARD_THRESHOLD") {
            config.loop_guard.threshold = parse(&k, &v)?;
        }
        if let Some((k, v)) = get("LOOP_GUARD_WINDOW_SIZE") {
            config.loop_guard.window_size = parse(&k, &v)?;
        }
        if let Some((k, v)) = get("TEAM_MAX_TOTAL_ITERATIONS") {
            config.team.max_total_iterations = parse(&k, &v)?;
        }
        if let Some((k, v)) = get("SESSION_MAX_HISTORY") {
            config.session.max_history = parse(&k, &v)?;
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("{:?}: {}", value, e)))
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("{:?} is not a boolean", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_overrides() {
        let config = EnvOverrides::new("AGENTLOOP_")
            .apply(
                EngineConfig::default(),
                lookup(&[
                    ("AGENTLOOP_MAX_ITERATIONS", "7"),
                    ("AGENTLOOP_TOOL_CALLING", "off"),
                    ("AGENTLOOP_RETRY_DELAY_MS", "0"),
                    ("AGENTLOOP_FINISH_MARKER", "<done>"),
                    ("OTHER_MAX_ITERATIONS", "99"),
                ]),
            )
            .unwrap();

        assert_eq!(config.agent_loop.max_iterations, 7);
        assert!(!config.agent_loop.tool_calling);
        assert_eq!(config.retry.delay_ms, 0);
        assert_eq!(config.team.finish_marker, "<done>");
    }

    #[test]
    fn test_invalid_value() {
        let err = EnvOverrides::new("X_")
            .apply(
                EngineConfig::default(),
                lookup(&[("X_LOOP_GUARD_THRESHOLD", "many")]),
            )
            .unwrap_err();
        assert!(err.to_string().contains("X_LOOP_GUARD_THRESHOLD"));

        let err = EnvOverrides::new("X_")
            .apply(EngineConfig::default(), lookup(&[("X_PLANNING", "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("not a boolean"));
    }
}
