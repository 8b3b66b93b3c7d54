use serde::{Deserialize, Serialize};

use super::{PromptMessage, Role};

/// Chat framing a model was instruction-tuned with.
///
/// Rendering always ends with the assistant generation cue so the backend
/// continues as the assistant. No convention introduces braces, so the
/// placeholder set of the content survives rendering unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatConvention {
    /// Llama 3 header tokens.
    Llama3,
    /// Llama 2 / CodeLlama `[INST]` blocks with `<<SYS>>`.
    Llama2,
    /// ChatML (`<|im_start|>`), used by Qwen2.
    ChatMl,
    /// ChatGLM3 role tags.
    ChatGlm3,
}

impl ChatConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llama3 => "llama3",
            Self::Llama2 => "llama2",
            Self::ChatMl => "chatml",
            Self::ChatGlm3 => "chatglm3",
        }
    }

    /// Tokens that end an assistant turn. Sent as stop sequences and
    /// stripped from output if a backend echoes them.
    pub fn stop_sequences(&self) -> &'static [&'static str] {
        match self {
            Self::Llama3 => &["<|eot_id|>", "<|end_of_text|>"],
            Self::Llama2 => &["</s>", "[INST]"],
            Self::ChatMl => &["<|im_end|>", "<|endoftext|>"],
            Self::ChatGlm3 => &["<|user|>", "<|observation|>"],
        }
    }

    pub fn render(&self, messages: &[PromptMessage]) -> String {
        match self {
            Self::Llama3 => render_llama3(messages),
            Self::Llama2 => render_llama2(messages),
            Self::ChatMl => render_chatml(messages),
            Self::ChatGlm3 => render_chatglm3(messages),
        }
    }
}

fn render_llama3(messages: &[PromptMessage]) -> String {
    let mut out = String::from("<|begin_of_text|>");
    for m in messages {
        out.push_str(&format!(
            "<|start_header_id|>{}<|end_header_id|>\n\n{}<|eot_id|>",
            m.role.as_str(),
            m.content.trim()
        ));
    }
    out.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
    out
}

fn render_chatml(messages: &[PromptMessage]) -> String {
    let mut out = String::new();
    for m in messages {
        out.push_str(&format!(
            "<|im_start|>{}\n{}<|im_end|>\n",
            m.role.as_str(),
            m.content
        ));
    }
    out.push_str("<|im_start|>assistant\n");
    out
}

fn render_chatglm3(messages: &[PromptMessage]) -> String {
    let mut out = String::from("[gMASK]sop");
    for m in messages {
        out.push_str(&format!("<|{}|>\n {}", m.role.as_str(), m.content));
    }
    out.push_str("<|assistant|>");
    out
}

/// Llama 2 folds the system message into the first user turn.
fn render_llama2(messages: &[PromptMessage]) -> String {
    let mut system: Option<&str> = None;
    let mut out = String::new();

    for m in messages {
        match m.role {
            Role::System => system = Some(m.content.trim()),
            Role::User => {
                let content = match system.take() {
                    Some(sys) => format!("<<SYS>>\n{sys}\n<</SYS>>\n\n{}", m.content.trim()),
                    None => m.content.trim().to_string(),
                };
                out.push_str(&format!("<s>[INST] {content} [/INST]"));
            }
            Role::Assistant => {
                out.push_str(&format!(" {} </s>", m.content.trim()));
            }
        }
    }
    out
}
