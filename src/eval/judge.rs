//! LLM-as-judge for answer correctness.

use crate::config::LlmConfig;
use crate::error::Result;
use crate::llm::{LlmClient, Prompts, extract_xml_tag};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Verdict on a generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    /// Whether the answer matches the expected answer.
    pub is_correct: bool,
    /// Explanation from the judge, if it gave one.
    pub reasoning: Option<String>,
}

/// Capability to decide whether a response answers a question correctly.
#[async_trait]
pub trait AnswerJudge: Send + Sync {
    async fn judge(
        &self,
        question: &str,
        response: &str,
        expected_answer: &str,
    ) -> Result<Judgement>;
}

/// LLM-as-judge comparing a response with the expected answer.
#[derive(Clone)]
pub struct LlmJudge {
    client: LlmClient,
}

impl LlmJudge {
    /// Create a new judge with the given LLM client.
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    /// Create from LLM config.
    pub fn from_config(config: LlmConfig) -> Result<Self> {
        Ok(Self::new(LlmClient::new(config)?))
    }

    /// Parse the judge's tagged response.
    ///
    /// A missing `<result>` tag counts as incorrect and the raw response is
    /// kept as the reasoning.
    fn parse_judgement(response: &str) -> Judgement {
        match extract_xml_tag(response, "result") {
            Some(result) => Judgement {
                is_correct: result.to_lowercase() == "true",
                reasoning: extract_xml_tag(response, "reasoning"),
            },
            None => Judgement {
                is_correct: false,
                reasoning: Some(format!("No result found: ({})", response)),
            },
        }
    }
}

#[async_trait]
impl AnswerJudge for LlmJudge {
    async fn judge(
        &self,
        question: &str,
        response: &str,
        expected_answer: &str,
    ) -> Result<Judgement> {
        let prompt = Prompts::answer_judge_input(question, response, expected_answer);

        let raw = self
            .client
            .complete(Some(Prompts::answer_judge()), &prompt)
            .await?;
        debug!(response = %raw, "Judge response");

        Ok(Self::parse_judgement(&raw))
    }
}
