//! Supported instruction-tuned models and their generation defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::backend::GenerationConfig;
use super::prompt::ChatConvention;

/// Context window requested by default. Larger windows are opt-in.
pub const DEFAULT_CONTEXT_CAP: u32 = 32_768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Llama2,
    Llama3,
    #[value(name = "codellama")]
    CodeLlama,
    Qwen2,
    #[value(name = "chatglm3")]
    ChatGlm3,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        Self::Llama2,
        Self::Llama3,
        Self::CodeLlama,
        Self::Qwen2,
        Self::ChatGlm3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llama2 => "llama2",
            Self::Llama3 => "llama3",
            Self::CodeLlama => "codellama",
            Self::Qwen2 => "qwen2",
            Self::ChatGlm3 => "chatglm3",
        }
    }

    pub fn convention(&self) -> ChatConvention {
        match self {
            Self::Llama2 | Self::CodeLlama => ChatConvention::Llama2,
            Self::Llama3 => ChatConvention::Llama3,
            Self::Qwen2 => ChatConvention::ChatMl,
            Self::ChatGlm3 => ChatConvention::ChatGlm3,
        }
    }

    /// Tag pulled into a local Ollama instance.
    pub fn ollama_tag(&self) -> &'static str {
        match self {
            Self::Llama2 => "llama2:7b-chat",
            Self::Llama3 => "llama3:8b-instruct",
            Self::CodeLlama => "codellama:7b-instruct",
            Self::Qwen2 => "qwen2:7b-instruct",
            Self::ChatGlm3 => "chatglm3:6b",
        }
    }

    /// Model id on the hosted inference endpoint.
    pub fn hub_id(&self) -> &'static str {
        match self {
            Self::Llama2 => "meta-llama/Llama-2-7b-chat-hf",
            Self::Llama3 => "meta-llama/Meta-Llama-3-8B-Instruct",
            Self::CodeLlama => "meta-llama/CodeLlama-7b-Instruct-hf",
            Self::Qwen2 => "Qwen/Qwen2-7B-Instruct",
            Self::ChatGlm3 => "THUDM/chatglm3-6b",
        }
    }

    pub fn context_length(&self) -> u32 {
        match self {
            Self::Llama2 => 4096,
            Self::ChatGlm3 => 8192,
            Self::Llama3 | Self::CodeLlama => 16384,
            Self::Qwen2 => 131_072,
        }
    }

    /// Greedy decoding, the model's sampling values kept for `--sample`.
    pub fn generation_config(&self) -> GenerationConfig {
        let (temperature, top_p) = match self {
            Self::Llama3 => (0.6, 0.9),
            _ => (0.8, 0.8),
        };
        GenerationConfig {
            temperature,
            top_p,
            max_tokens: Some(2048),
            context_length: Some(self.context_length().min(DEFAULT_CONTEXT_CAP)),
            deterministic: true,
            stop: self
                .convention()
                .stop_sequences()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses_every_model_name() {
        use clap::ValueEnum;
        for model in ModelKind::ALL {
            assert_eq!(ModelKind::from_str(model.as_str(), true).unwrap(), model);
        }
        assert_eq!(ModelKind::from_str("Qwen2", true).unwrap(), ModelKind::Qwen2);
        assert!(ModelKind::from_str("gpt5", true).is_err());
    }

    #[test]
    fn conventions_follow_model_family() {
        assert_eq!(ModelKind::CodeLlama.convention(), ChatConvention::Llama2);
        assert_eq!(ModelKind::Qwen2.convention(), ChatConvention::ChatMl);
        assert_eq!(ModelKind::Llama3.convention(), ChatConvention::Llama3);
    }

    #[test]
    fn generation_defaults_are_greedy_with_stops() {
        let config = ModelKind::Llama3.generation_config();
        assert!(config.deterministic);
        assert!((config.top_p - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.context_length, Some(16384));
        assert!(config.stop.iter().any(|s| s == "<|eot_id|>"));

        let qwen = ModelKind::Qwen2.generation_config();
        assert_eq!(qwen.context_length, Some(DEFAULT_CONTEXT_CAP));
        assert_eq!(ModelKind::Qwen2.context_length(), 131_072);
    }

    #[test]
    fn clap_names_match_as_str() {
        use clap::ValueEnum;
        for model in ModelKind::ALL {
            let pv = model.to_possible_value().unwrap();
            assert_eq!(pv.get_name(), model.as_str());
        }
    }
}
