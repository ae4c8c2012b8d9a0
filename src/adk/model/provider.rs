// SPDX-License-Identifier: MIT

//! LLM providers and the factory that selects them by name

use super::openai::{ChatCompletionsModel, ToolCallIds};
use super::{Model, ModelInfo};
use crate::adk::config::{ApiKeys, ModelSpec};
use crate::adk::error::{ModelError, SqlAgentError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// A chat-completion vendor that can build [`Model`]s
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Lookup name, lowercase
    fn name(&self) -> &str;

    /// Whether models from this provider can emit tool invocation requests
    fn supports_tools(&self) -> bool;

    /// Build a model; `None` selects the provider default
    fn create(
        &self,
        model: Option<&str>,
        temperature: f32,
        max_retries: u32,
    ) -> Result<Arc<dyn Model>, SqlAgentError>;

    /// Chat models offered by the provider
    async fn list_models(&self) -> Result<BTreeSet<ModelInfo>, SqlAgentError>;
}

async fn fetch_catalog(
    client: &Client,
    provider: &str,
    base_url: &str,
    api_key: Option<&str>,
) -> Result<Value, SqlAgentError> {
    let api_key = api_key.ok_or_else(|| ModelError::ApiKeyMissing(provider.to_string()))?;
    let resp = client
        .get(format!("{}/models", base_url))
        .bearer_auth(api_key)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await?;
        return Err(SqlAgentError::api(provider, format!("HTTP {}: {}", status, text)));
    }

    Ok(resp.json().await?)
}

fn catalog_entries(catalog: &Value) -> &[Value] {
    catalog["data"].as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// Keep chat models that can call functions
pub fn parse_mistral_models(catalog: &Value) -> BTreeSet<ModelInfo> {
    catalog_entries(catalog)
        .iter()
        .filter(|m| {
            let caps = &m["capabilities"];
            caps["completion_chat"].as_bool().unwrap_or(false)
                && caps["function_calling"].as_bool().unwrap_or(false)
        })
        .filter_map(|m| {
            let id = m["id"].as_str()?;
            Some(ModelInfo {
                id: id.to_string(),
                name: m["name"].as_str().unwrap_or(id).to_string(),
                context_length: m["max_context_length"].as_u64().unwrap_or(0),
            })
        })
        .collect()
}

/// Keep active models, minus speech-to-text
pub fn parse_groq_models(catalog: &Value) -> BTreeSet<ModelInfo> {
    catalog_entries(catalog)
        .iter()
        .filter(|m| m["active"].as_bool().unwrap_or(false))
        .filter_map(|m| {
            let id = m["id"].as_str()?;
            if id.to_lowercase().contains("whisper") {
                return None;
            }
            Some(ModelInfo {
                id: id.to_string(),
                name: id.to_string(),
                context_length: m["context_window"].as_u64().unwrap_or(0),
            })
        })
        .collect()
}

pub struct MistralProvider {
    client: Client,
    api_key: Option<String>,
}

impl MistralProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl LlmProvider for MistralProvider {
    fn name(&self) -> &str {
        "mistral"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn create(
        &self,
        model: Option<&str>,
        temperature: f32,
        max_retries: u32,
    ) -> Result<Arc<dyn Model>, SqlAgentError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| ModelError::ApiKeyMissing(self.name().to_string()))?;
        let model = ChatCompletionsModel::new(
            self.name(),
            MISTRAL_BASE_URL,
            api_key,
            model.unwrap_or("codestral-latest"),
        )
        .with_temperature(temperature)
        .with_max_retries(max_retries)
        .with_tool_call_ids(ToolCallIds::Alphanumeric9);
        Ok(Arc::new(model))
    }

    async fn list_models(&self) -> Result<BTreeSet<ModelInfo>, SqlAgentError> {
        let catalog = fetch_catalog(
            &self.client,
            self.name(),
            MISTRAL_BASE_URL,
            self.api_key.as_deref(),
        )
        .await?;
        Ok(parse_mistral_models(&catalog))
    }
}

pub struct GroqProvider {
    client: Client,
    api_key: Option<String>,
}

impl GroqProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn create(
        &self,
        model: Option<&str>,
        temperature: f32,
        max_retries: u32,
    ) -> Result<Arc<dyn Model>, SqlAgentError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| ModelError::ApiKeyMissing(self.name().to_string()))?;
        let model = ChatCompletionsModel::new(
            self.name(),
            GROQ_BASE_URL,
            api_key,
            model.unwrap_or("llama-3.1-70b-versatile"),
        )
        .with_temperature(temperature)
        .with_max_retries(max_retries);
        Ok(Arc::new(model))
    }

    async fn list_models(&self) -> Result<BTreeSet<ModelInfo>, SqlAgentError> {
        let catalog = fetch_catalog(
            &self.client,
            self.name(),
            GROQ_BASE_URL,
            self.api_key.as_deref(),
        )
        .await?;
        Ok(parse_groq_models(&catalog))
    }
}

/// Provider lookup table
#[derive(Clone)]
pub struct LlmFactory {
    providers: BTreeMap<String, Arc<dyn LlmProvider>>,
}

impl LlmFactory {
    /// Factory with the built-in providers
    pub fn new(keys: &ApiKeys) -> Self {
        Self::with_providers(vec![
            Arc::new(MistralProvider::new(keys.mistral.clone())),
            Arc::new(GroqProvider::new(keys.groq.clone())),
        ])
    }

    pub fn with_providers(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_lowercase(), p))
            .collect();
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Case-insensitive provider lookup
    pub fn provider(&self, name: &str) -> Result<Arc<dyn LlmProvider>, SqlAgentError> {
        self.providers
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                ModelError::UnsupportedProvider {
                    provider: name.to_lowercase(),
                    supported: self.provider_names().join(", "),
                }
                .into()
            })
    }

    /// Build the model described by `spec`, rejecting providers without tool support
    pub fn create(&self, spec: &ModelSpec) -> Result<Arc<dyn Model>, SqlAgentError> {
        let provider = self.provider(&spec.provider)?;
        if !provider.supports_tools() {
            return Err(ModelError::ToolsUnsupported(provider.name().to_string()).into());
        }
        log::info!(
            "Creating {} model {}",
            provider.name(),
            spec.model.as_deref().unwrap_or("<default>")
        );
        provider.create(spec.model.as_deref(), spec.temperature, spec.max_retries)
    }

    pub async fn list_models(&self, provider: &str) -> Result<BTreeSet<ModelInfo>, SqlAgentError> {
        self.provider(provider)?.list_models().await
    }
}
