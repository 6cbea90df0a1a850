//! Ground-truth question sets for evaluation.
//!
//! Supports the plain JSON array format produced alongside sample corpora:
//!
//! ```json
//! [
//!   {
//!     "question": "What is X?",
//!     "answer": "X is Y",
//!     "relevant_doc_ids": ["doc_3", "doc_7"]
//!   }
//! ]
//! ```
//!
//! as well as a named wrapper `{"name": "...", "items": [...]}`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A question with its expected answer and optional relevant document IDs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestQuestion {
    /// The question to ask the pipeline.
    pub question: String,
    /// Ground truth answer.
    #[serde(rename = "answer", alias = "expected_answer")]
    pub expected_answer: String,
    /// IDs of documents that should be retrieved. `None` means no ground
    /// truth is known, which is different from an empty list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant_doc_ids: Option<Vec<String>>,
}

impl TestQuestion {
    pub fn new(question: impl Into<String>, expected_answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            expected_answer: expected_answer.into(),
            relevant_doc_ids: None,
        }
    }

    pub fn with_relevant_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relevant_doc_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

/// A named collection of test questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Dataset name.
    pub name: String,
    /// Dataset items.
    pub items: Vec<TestQuestion>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    Named(Dataset),
    Bare(Vec<TestQuestion>),
}

impl Dataset {
    /// Create a new empty dataset.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: Vec::new(),
        }
    }

    /// Add an item to the dataset.
    pub fn add_item(&mut self, item: TestQuestion) {
        self.items.push(item);
    }

    /// Number of items in the dataset.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get a subset of items (for quick testing).
    pub fn take(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            items: self.items.iter().take(n).cloned().collect(),
        }
    }

    /// Look up a question by its exact text.
    pub fn find(&self, question: &str) -> Option<&TestQuestion> {
        self.items.iter().find(|q| q.question == question)
    }

    /// Load from a JSON file. A bare array is named after the file stem.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset file: {:?}", path))?;
        let parsed: DatasetFile =
            serde_json::from_str(&content).with_context(|| "Failed to parse dataset JSON")?;

        Ok(match parsed {
            DatasetFile::Named(dataset) => dataset,
            DatasetFile::Bare(items) => Self {
                name: path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("dataset")
                    .to_string(),
                items,
            },
        })
    }

    /// Save to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Create a small sample dataset for testing.
pub fn create_sample_dataset() -> Dataset {
    let mut dataset = Dataset::new("sample");

    dataset.add_item(
        TestQuestion::new(
            "What mechanism does Rust use to achieve memory safety?",
            "Rust uses an ownership system and borrow checker to achieve memory safety without garbage collection.",
        )
        .with_relevant_ids(["rust_ownership.md"]),
    );

    dataset.add_item(
        TestQuestion::new(
            "Who created Python and when was it first released?",
            "Python was created by Guido van Rossum and first released in 1991.",
        )
        .with_relevant_ids(["python_history.md"]),
    );

    dataset.add_item(TestQuestion::new(
        "What is the difference between supervised and unsupervised learning?",
        "Supervised learning uses labeled data to train models, while unsupervised learning finds patterns in unlabeled data.",
    ));

    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dataset_operations() {
        let mut dataset = Dataset::new("test");
        assert!(dataset.is_empty());

        dataset.add_item(TestQuestion::new("Test question?", "Test answer"));

        assert_eq!(dataset.len(), 1);
        assert!(!dataset.is_empty());
        assert!(dataset.find("Test question?").is_some());
        assert!(dataset.find("Other?").is_none());
    }

    #[test]
    fn test_dataset_take() {
        let dataset = create_sample_dataset();
        assert_eq!(dataset.len(), 3);

        let subset = dataset.take(2);
        assert_eq!(subset.len(), 2);
    }

    #[test]
    fn test_load_bare_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample_questions.json");
        fs::write(
            &path,
            r#"[
                {"question": "Q1", "answer": "A1", "relevant_doc_ids": ["d1", "d2"]},
                {"question": "Q2", "answer": "A2"},
                {"question": "Q3", "answer": "A3", "relevant_doc_ids": []}
            ]"#,
        )
        .unwrap();

        let dataset = Dataset::load_json(&path).unwrap();
        assert_eq!(dataset.name, "sample_questions");
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.items[0].expected_answer, "A1");
        assert_eq!(
            dataset.items[0].relevant_doc_ids,
            Some(vec!["d1".to_string(), "d2".to_string()])
        );
        assert_eq!(dataset.items[1].relevant_doc_ids, None);
        assert_eq!(dataset.items[2].relevant_doc_ids, Some(vec![]));
    }

    #[test]
    fn test_save_and_load_named() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("named.json");

        let original = create_sample_dataset();
        original.save_json(&path).unwrap();

        let loaded = Dataset::load_json(&path).unwrap();
        assert_eq!(loaded.name, "sample");
        assert_eq!(loaded.items, original.items);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(Dataset::load_json(Path::new("/nonexistent/questions.json")).is_err());
    }
}
