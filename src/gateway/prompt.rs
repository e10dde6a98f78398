//! Caption prompt templates
//!
//! One prompt is drawn uniformly at random per item to vary caption style
//! across a corpus.

use rand::Rng;
use std::path::Path;

/// Prompts used when no prompt file is given
pub const DEFAULT_PROMPTS: &[&str] = &[
    "Describe the video in detail.",
    "Provide a detailed description of everything that happens in this video, in chronological order.",
    "Describe the scene, the people or objects present, their actions, and how the scene changes over time.",
    "Write a thorough caption for this video covering the setting, the main subjects, the camera movement and the key events.",
];

/// Prompt loading errors
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// No usable prompt
    #[error("prompt set is empty")]
    Empty,

    /// IO error while reading a prompt file
    #[error("IO error: {0}")]
    IoError(String),
}

/// Non-empty set of prompt templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    prompts: Vec<String>,
}

impl PromptSet {
    /// Build a set from explicit prompts; blank entries are dropped
    pub fn new<I, S>(prompts: I) -> Result<Self, PromptError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prompts: Vec<String> = prompts
            .into_iter()
            .map(Into::into)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if prompts.is_empty() {
            return Err(PromptError::Empty);
        }
        Ok(Self { prompts })
    }

    /// Read prompts from a text file, one per non-blank line
    pub fn from_file(path: &Path) -> Result<Self, PromptError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| PromptError::IoError(format!("Failed to read {}: {e}", path.display())))?;
        Self::new(contents.lines())
    }

    /// Pick one prompt uniformly at random
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        let idx = rng.gen_range(0..self.prompts.len());
        &self.prompts[idx]
    }

    /// All prompts
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Number of prompts
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Whether the set has no prompts (never true once constructed)
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            prompts: DEFAULT_PROMPTS.iter().map(|p| p.to_string()).collect(),
        }
    }
}
