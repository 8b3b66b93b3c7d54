use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{BackendError, GenerationConfig, ModelBackend};

/// Hosted text-generation-inference endpoint.
///
/// Sends `{inputs, parameters}` and reads `generated_text` back, with
/// `return_full_text: false` so the prompt is not echoed.
pub struct EndpointBackend {
    url: String,
    token: Option<SecretString>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl EndpointBackend {
    pub fn new(url: &str, token: Option<SecretString>, timeout_secs: u64) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BackendError::HttpClient(e.to_string()))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            token,
            client,
            timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_body<'a>(prompt: &'a str, config: &'a GenerationConfig) -> InferenceRequest<'a> {
        // TGI rejects temperature 0 and top_p outside (0, 1) when sampling,
        // so greedy requests send neither.
        let sampling = !config.deterministic;
        InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                do_sample: sampling,
                temperature: sampling.then_some(config.temperature),
                top_p: sampling.then_some(config.top_p).filter(|p| *p > 0.0 && *p < 1.0),
                max_new_tokens: config.max_tokens,
                seed: config.seed(),
                stop: &config.stop,
                return_full_text: false,
            },
        }
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters<'a>,
}

#[derive(Serialize)]
struct InferenceParameters<'a> {
    do_sample: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    return_full_text: bool,
}

#[derive(Deserialize)]
struct Generation {
    generated_text: String,
}

/// The inference API answers with a list; TGI's /generate with an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<Generation>),
    Single(Generation),
}

impl InferenceResponse {
    fn into_text(self) -> Result<String, BackendError> {
        match self {
            Self::Single(g) => Ok(g.generated_text),
            Self::Batch(mut list) => {
                if list.is_empty() {
                    return Err(BackendError::ResponseParsing("empty generation list".into()));
                }
                Ok(list.swap_remove(0).generated_text)
            }
        }
    }
}

impl ModelBackend for EndpointBackend {
    fn name(&self) -> &str {
        "endpoint"
    }

    fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String, BackendError> {
        let body = Self::request_body(prompt, config);

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .map_err(|e| BackendError::from_reqwest(e, &self.url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: InferenceResponse = response
            .json()
            .map_err(|e| BackendError::ResponseParsing(e.to_string()))?;

        parsed.into_text()
    }
}
