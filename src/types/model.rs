//! Model descriptor types.
//!
//! [`ModelSummary`] is what a server reports for each installed model,
//! plus a few display helpers derived purely from the name and size.

use serde::{Deserialize, Serialize};

/// A model installed on an inference server, as listed by `/api/tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Model tag (e.g., "llama3.2:latest").
    #[serde(default)]
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default)]
    pub size: u64,
    /// Last modification timestamp as reported by the server.
    #[serde(default)]
    pub modified_at: String,
    /// Content digest of the model blob.
    #[serde(default)]
    pub digest: String,
}

impl ModelSummary {
    /// Create a summary with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the size in bytes.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Human-readable size using 1024-based units ("3.8 GB").
    ///
    /// Returns `"Unknown"` when the server did not report a size.
    pub fn size_human(&self) -> String {
        if self.size == 0 {
            return "Unknown".to_string();
        }
        let mut value = self.size as f64;
        for unit in ["B", "KB", "MB", "GB", "TB"] {
            if value < 1024.0 {
                return format!("{value:.1} {unit}");
            }
            value /= 1024.0;
        }
        format!("{value:.1} PB")
    }

    /// Coarse family classification from the model name.
    pub fn category(&self) -> ModelCategory {
        let name = self.name.to_lowercase();
        // "codellama" contains "llama", so it lands in the LLaMA family first.
        if name.contains("llama") {
            ModelCategory::Llama
        } else if name.contains("mistral") {
            ModelCategory::Mistral
        } else if name.contains("codellama") {
            ModelCategory::Code
        } else if name.contains("vicuna") {
            ModelCategory::Vicuna
        } else if name.contains("alpaca") {
            ModelCategory::Alpaca
        } else {
            ModelCategory::Other
        }
    }

    /// Capabilities guessed from name patterns. Text generation is always present.
    pub fn capabilities(&self) -> Vec<&'static str> {
        let name = self.name.to_lowercase();
        let mut caps = vec!["Text Generation"];
        for (needle, label) in [
            ("code", "Code Generation"),
            ("instruct", "Instruction Following"),
            ("chat", "Conversational"),
            ("uncensored", "Uncensored"),
        ] {
            if name.contains(needle) {
                caps.push(label);
            }
        }
        caps
    }
}

/// Model family, as shown in model pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelCategory {
    Llama,
    Mistral,
    Code,
    Vicuna,
    Alpaca,
    Other,
}

impl ModelCategory {
    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            ModelCategory::Llama => "LLaMA Family",
            ModelCategory::Mistral => "Mistral Family",
            ModelCategory::Code => "Code Specialized",
            ModelCategory::Vicuna => "Vicuna Family",
            ModelCategory::Alpaca => "Alpaca Family",
            ModelCategory::Other => "Other",
        }
    }
}

impl std::fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Server build information from `/api/version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llama_cpp_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuda_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
}
