//! Chat-completion client — invokes the reasoning capability via HTTP.
//!
//! Model-backed workers and strategies all go through this client rather
//! than spawning local agent processes. It speaks the Anthropic-compatible
//! Messages API, which several providers expose behind a configurable base
//! URL.

use serde::{Deserialize, Serialize};

use crate::error::TeamError;
use crate::history::{ChatHistory, Role};

/// Configuration for one completion endpoint + model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// API base URL
    pub base_url: String,
    /// API key / auth token
    pub api_key: String,
    /// Model ID
    pub model: String,
    /// Temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// System prompt sent with every request
    #[serde(default)]
    pub system_prompt: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            temperature: None,
            system_prompt: String::new(),
        }
    }
}

impl CompletionConfig {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

/// Calls a completion endpoint over HTTP.
pub struct CompletionClient {
    client: reqwest::Client,
}

impl Default for CompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Complete against a full conversation history.
    pub async fn complete(
        &self,
        config: &CompletionConfig,
        history: &ChatHistory,
    ) -> Result<String, TeamError> {
        self.request(config, flatten_history(history)).await
    }

    /// Complete against a single user prompt (planning/feedback calls).
    pub async fn complete_prompt(
        &self,
        config: &CompletionConfig,
        prompt: &str,
    ) -> Result<String, TeamError> {
        let messages = vec![serde_json::json!({ "role": "user", "content": prompt })];
        self.request(config, messages).await
    }

    /// POST {base_url}/v1/messages
    /// Headers:
    ///   x-api-key: {api_key}
    ///   anthropic-version: 2023-06-01
    async fn request(
        &self,
        config: &CompletionConfig,
        messages: Vec<serde_json::Value>,
    ) -> Result<String, TeamError> {
        let url = format!("{}/v1/messages", config.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": config.model,
            "max_tokens": 8192,
            "messages": messages,
        });

        if !config.system_prompt.is_empty() {
            body["system"] = serde_json::Value::String(config.system_prompt.clone());
        }

        if let Some(temp) = config.temperature {
            body["temperature"] = serde_json::Value::Number(
                serde_json::Number::from_f64(temp).unwrap_or_else(|| serde_json::Number::from(0)),
            );
        }

        tracing::debug!(
            "[Completion] Calling {} (model: {})",
            url,
            config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TeamError::Completion(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| TeamError::Completion(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(TeamError::Completion(format!(
                "API returned {}: {}",
                status, response_text
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| TeamError::Completion(format!("Failed to parse response JSON: {}", e)))?;

        let content = json
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|arr| {
                arr.iter()
                    .filter_map(|block| {
                        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                            block
                                .get("text")
                                .and_then(|t| t.as_str())
                                .map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                    .reduce(|a, b| format!("{}\n{}", a, b))
            })
            .unwrap_or_default();

        Ok(content)
    }
}

/// Flatten a history into Messages-API entries.
///
/// The API only accepts alternating user/assistant roles; system and tool
/// entries are folded into user turns with the sender prefixed so the model
/// can still attribute them.
pub(crate) fn flatten_history(history: &ChatHistory) -> Vec<serde_json::Value> {
    history
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| {
            let role = match m.role {
                Role::Assistant => "assistant",
                _ => "user",
            };
            serde_json::json!({
                "role": role,
                "content": format!("[{}] {}", m.sender, m.content),
            })
        })
        .collect()
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}` syntax.
pub fn resolve_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_expr = &caps[1];
        if let Some(idx) = var_expr.find(":-") {
            let var_name = &var_expr[..idx];
            let default_val = &var_expr[idx + 2..];
            std::env::var(var_name).unwrap_or_else(|_| default_val.to_string())
        } else {
            std::env::var(var_expr).unwrap_or_else(|_| format!("${{{}}}", var_expr))
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Message;

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_TROUPE_VAR", "hello");
        assert_eq!(resolve_env_vars("${TEST_TROUPE_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix-${TEST_TROUPE_VAR}-suffix"),
            "prefix-hello-suffix"
        );
        assert_eq!(resolve_env_vars("${NONEXISTENT_VAR:-fallback}"), "fallback");
        std::env::remove_var("TEST_TROUPE_VAR");
    }

    #[test]
    fn test_flatten_history_roles_and_blanks() {
        let mut history = ChatHistory::new();
        history.push(Message::user("caller", "process this order"));
        history.push(Message::assistant("team", "validator: check the SKUs"));
        history.push(Message::assistant("validator", "   "));

        let flat = flatten_history(&history);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0]["role"], "user");
        assert_eq!(flat[1]["role"], "assistant");
        assert!(flat[0]["content"].as_str().unwrap().starts_with("[caller]"));
    }
}
