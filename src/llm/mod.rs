//! LLM integration module.
//!
//! Provides an OpenAI-compatible client and the prompts used to generate
//! and judge answers.

mod client;
mod prompts;

pub use client::LlmClient;
pub use prompts::{Prompts, clean_answer, extract_xml_tag};
