//! LLM prompts for answer generation and answer judging.

/// Collection of prompts used by the evaluation flow.
pub struct Prompts;

impl Prompts {
    /// System prompt for answering a question from retrieved context.
    ///
    /// `{context}` is replaced with the retrieved chunks joined by `---`.
    pub fn rag_answer() -> &'static str {
        r#"You are a meticulous assistant. Answer the user's question based ONLY on the provided context.

Follow these steps carefully:
1. Chain of Thought: First write step-by-step reasoning about how the context answers the question. Point out which parts of the context are relevant and how they combine. Put this in <reasoning>...</reasoning> tags.
2. Final Answer: Then give the final, concise answer in <result>...</result> tags.

If the context does not contain the information needed, say so clearly in both your reasoning and your final answer. Do not make up information.

Context:
{context}"#
    }

    /// System prompt for judging a generated answer against the expected one.
    pub fn answer_judge() -> &'static str {
        r#"You are a system that evaluates the correctness of a response to a question.
The question will be provided in <question>...</question> tags.
The response will be provided in <response>...</response> tags.
The expected answer will be provided in <expected_answer>...</expected_answer> tags.

The response doesn't have to match all the words or context of the expected answer. It just needs to be right about the answer to the actual question itself.

Evaluate whether the response is correct or not, and return your reasoning in <reasoning>...</reasoning> tags.
Then return the result in <result>...</result> tags, either as 'true' or 'false'."#
    }

    /// User message for the judge. Values are inserted verbatim in one pass.
    pub fn answer_judge_input(question: &str, response: &str, expected_answer: &str) -> String {
        format!(
            "<question>\n{question}\n</question>\n\
             <response>\n{response}\n</response>\n\
             <expected_answer>\n{expected_answer}\n</expected_answer>"
        )
    }
}

/// Content of the first `<tag>...</tag>` block, trimmed.
pub fn extract_xml_tag(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim().to_string())
}

/// Strip reasoning blocks and markup from a model answer.
///
/// `<reasoning>` blocks are dropped with their content, `<result>` tags are
/// unwrapped, any other tag is removed and whitespace is collapsed.
pub fn clean_answer(answer: &str) -> String {
    let mut text = answer.to_string();
    while let Some(start) = text.find("<reasoning>") {
        match text[start..].find("</reasoning>") {
            Some(offset) => {
                let end = start + offset + "</reasoning>".len();
                text.replace_range(start..end, " ");
            }
            None => break,
        }
    }

    let mut cleaned = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(open) = rest.find('<') {
        match rest[open..].find('>') {
            Some(close) => {
                cleaned.push_str(&rest[..open]);
                cleaned.push(' ');
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    cleaned.push_str(rest);

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
