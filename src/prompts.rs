//! Loader for instruction templates.
//!
//! Templates live in the `prompts/` directory at the project root. A
//! missing template is a startup failure, never a silent fallback.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Available prompt templates.
#[derive(Debug, Clone, Copy)]
pub enum Prompt {
    /// Turns raw text into the structured knowledge schema.
    Structuring,
    /// Answers a question from retrieved knowledge context.
    RagAnswer,
}

impl Prompt {
    /// Template file name (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::Structuring => "structuring.md",
            Prompt::RagAnswer => "rag_answer.md",
        }
    }

    /// Load the template from disk.
    pub fn load(&self) -> Result<String> {
        load_prompt(self.filename())
    }
}

/// Load a template by file name.
pub fn load_prompt(filename: &str) -> Result<String> {
    let path = prompts_dir().join(filename);
    std::fs::read_to_string(&path)
        .map_err(|e| Error::PromptNotFound(format!("{}: {}", filename, e)))
}

/// Path to the prompts directory.
pub fn prompts_dir() -> PathBuf {
    // Look for prompts/ relative to the current or a parent directory
    let candidates = [
        PathBuf::from("prompts"),
        PathBuf::from("../prompts"),
        PathBuf::from("../../prompts"),
    ];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    // Fallback
    PathBuf::from("prompts")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_filenames() {
        assert_eq!(Prompt::Structuring.filename(), "structuring.md");
        assert_eq!(Prompt::RagAnswer.filename(), "rag_answer.md");
    }

    #[test]
    fn test_all_prompt_filenames_are_md() {
        for prompt in [Prompt::Structuring, Prompt::RagAnswer] {
            assert!(
                prompt.filename().ends_with(".md"),
                "Prompt {:?} should have .md extension",
                prompt
            );
        }
    }

    #[test]
    fn test_prompts_dir_returns_path() {
        let dir = prompts_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_load_prompt_nonexistent_file() {
        let err = load_prompt("nonexistent_file_12345.md").unwrap_err();
        assert!(matches!(err, Error::PromptNotFound(_)));
    }

    #[test]
    fn test_bundled_templates_load() {
        // Both repo templates must exist and carry their placeholders.
        let structuring = Prompt::Structuring.load().expect("structuring template");
        assert!(structuring.contains("{raw_text}"));

        let rag = Prompt::RagAnswer.load().expect("rag template");
        assert!(rag.contains("{context}"));
        assert!(rag.contains("{user_query}"));
    }
}
