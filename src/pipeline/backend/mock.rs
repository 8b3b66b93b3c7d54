use std::collections::VecDeque;
use std::sync::Mutex;

use super::{BackendError, GenerationConfig, ModelBackend};

type Reply = Result<String, BackendError>;

/// Scripted backend for tests and dry runs.
///
/// Resolution order per call: queued replies first, then the first rule
/// whose marker occurs in the prompt, then the default reply.
pub struct MockBackend {
    queue: Mutex<VecDeque<Reply>>,
    rules: Vec<(String, Reply)>,
    default: Reply,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new(default_response: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            rules: Vec::new(),
            default: Ok(default_response.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every unmatched call fails with `error`.
    pub fn failing(error: BackendError) -> Self {
        Self {
            default: Err(error),
            ..Self::new("")
        }
    }

    /// Answer `response` whenever the prompt contains `marker`.
    pub fn when(mut self, marker: &str, response: &str) -> Self {
        self.rules.push((marker.to_string(), Ok(response.to_string())));
        self
    }

    /// Fail with `error` whenever the prompt contains `marker`.
    pub fn when_err(mut self, marker: &str, error: BackendError) -> Self {
        self.rules.push((marker.to_string(), Err(error)));
        self
    }

    /// One-shot reply consumed before any rule.
    pub fn then_reply(self, reply: Reply) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    /// Prompts received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl ModelBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate(&self, prompt: &str, _config: &GenerationConfig) -> Result<String, BackendError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        if let Some(reply) = self.queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
            return reply;
        }

        self.rules
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reply_and_call_log() {
        let mock = MockBackend::new("none");
        let config = GenerationConfig::default();
        assert_eq!(mock.generate("a", &config).unwrap(), "none");
        assert_eq!(mock.generate("b", &config).unwrap(), "none");
        assert_eq!(mock.calls(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn first_matching_rule_wins() {
        let mock = MockBackend::new("fallback")
            .when("conductivity", "{\"conductivity\": \"1 mS/cm\"}")
            .when("con", "other");
        let config = GenerationConfig::default();
        assert_eq!(
            mock.generate("find the conductivity", &config).unwrap(),
            "{\"conductivity\": \"1 mS/cm\"}"
        );
        assert_eq!(mock.generate("context", &config).unwrap(), "other");
        assert_eq!(mock.generate("xyz", &config).unwrap(), "fallback");
    }

    #[test]
    fn queued_replies_take_precedence() {
        let mock = MockBackend::new("ok").then_reply(Err(BackendError::Timeout(5)));
        let config = GenerationConfig::default();
        assert_eq!(mock.generate("p", &config), Err(BackendError::Timeout(5)));
        assert_eq!(mock.generate("p", &config).unwrap(), "ok");
    }

    #[test]
    fn failing_backend_errors_every_call() {
        let mock = MockBackend::failing(BackendError::Connection("http://localhost:11434".into()));
        let config = GenerationConfig::default();
        assert!(mock.generate("p", &config).is_err());
        assert!(mock.generate("q", &config).is_err());
        assert_eq!(mock.call_count(), 2);
    }
}
