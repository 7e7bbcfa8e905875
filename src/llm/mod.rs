/// Graph delta proposal source
///
/// The builder API turns a natural-language prompt into a `GraphDelta` by
/// asking an OpenAI-compatible chat endpoint for a JSON proposal. The model
/// output is untrusted text: it is stripped of markdown fences, parsed, and
/// handed to the mutation engine, which does the real validation.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{EngineError, EngineResult};
use crate::graph::{GraphDelta, Workflow};

const SYSTEM_PROMPT: &str = r#"You are an API workflow designer. Given a user request and optionally the current workflow graph, respond with ONLY a JSON object of the form {"nodes": [...], "edges": [...]} describing the nodes and edges to add or update. Node types: input, inputValidation, dbFind, dbInsert, dbUpdate, dbDelete, authMiddleware, emailSend, jwtGenerate, delay, response. Each node has "id", "type", "label" and "fields". Use {{input.x}} style references to wire data between nodes. Do not include explanations or markdown."#;

/// Something that can turn a prompt into a proposed graph delta.
#[async_trait]
pub trait ProposalSource: Send + Sync {
    async fn propose_delta(
        &self,
        prompt: &str,
        current: Option<&Workflow>,
    ) -> EngineResult<GraphDelta>;
}

/// Chat-completions backed proposal source (OpenAI-compatible endpoints).
pub struct OpenAiProposalSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProposalSource {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ProposalSource for OpenAiProposalSource {
    async fn propose_delta(
        &self,
        prompt: &str,
        current: Option<&Workflow>,
    ) -> EngineResult<GraphDelta> {
        let user_message = match current {
            Some(workflow) => format!(
                "Current workflow graph:\n{}\n\nRequest: {}",
                serde_json::to_string_pretty(&json!({
                    "nodes": &workflow.nodes,
                    "edges": &workflow.edges,
                }))?,
                prompt
            ),
            None => format!("Request: {prompt}"),
        };

        tracing::info!("🤖 Requesting graph proposal from model '{}'", self.model);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": user_message},
                ],
                "temperature": 0.2,
            }))
            .send()
            .await
            .map_err(|e| EngineError::Proposal(format!("model request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::Proposal(format!(
                "model endpoint returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Proposal(format!("malformed model response: {e}")))?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                EngineError::Proposal("model response missing message content".to_string())
            })?;

        parse_delta(content)
    }
}

/// Parse a model reply into a delta, tolerating markdown code fences.
pub fn parse_delta(content: &str) -> EngineResult<GraphDelta> {
    let cleaned = strip_fences(content);
    serde_json::from_str(cleaned)
        .map_err(|e| EngineError::Proposal(format!("proposal is not valid delta JSON: {e}")))
}

fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_delta_json() {
        let delta = parse_delta(
            r#"{"nodes": [{"id": "r1", "type": "response", "fields": {"status": 200, "body": {}}}], "edges": []}"#,
        )
        .unwrap();
        assert_eq!(delta.nodes.len(), 1);
        assert!(delta.edges.is_empty());
    }

    #[test]
    fn strips_markdown_fences() {
        let delta = parse_delta("```json\n{\"nodes\": [], \"edges\": []}\n```").unwrap();
        assert!(delta.nodes.is_empty());
    }

    #[test]
    fn rejects_prose_replies() {
        let err = parse_delta("Sure! Here is your workflow...").unwrap_err();
        assert_eq!(err.kind(), "proposal");
    }
}
