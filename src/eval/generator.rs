//! Answer generation from retrieved context.

use crate::error::Result;
use crate::llm::{LlmClient, Prompts, extract_xml_tag};
use async_trait::async_trait;
use tracing::warn;

/// Capability to answer a question from a list of context chunks.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &[String]) -> Result<String>;
}

/// Chain-of-thought answer generation over an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct LlmGenerator {
    client: LlmClient,
}

impl LlmGenerator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn system_prompt(context: &[String]) -> String {
        Prompts::rag_answer().replace("{context}", &context.join("\n---\n"))
    }

    /// Pull the final answer out of a chain-of-thought response.
    fn final_answer(response: &str) -> String {
        match extract_xml_tag(response, "result") {
            Some(answer) => answer,
            None => {
                warn!("Model did not follow the XML format, using the full response");
                response.trim().to_string()
            }
        }
    }
}

#[async_trait]
impl AnswerGenerator for LlmGenerator {
    async fn generate(&self, question: &str, context: &[String]) -> Result<String> {
        let system = Self::system_prompt(context);
        let response = self.client.complete(Some(&system), question).await?;
        Ok(Self::final_answer(&response))
    }
}
