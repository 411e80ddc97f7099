//! Google Cloud Text-to-Speech REST client.
//!
//! One request per fragment: the fragment (or plain text) plus a fallback
//! voice selection go in, a base64-encoded MP3 payload comes out.

use super::{Result, Synthesizer, TtsError, VoiceSelection};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const GOOGLE_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Environment variable consulted when no key is configured explicitly.
pub const API_KEY_ENV_VAR: &str = "GOOGLE_TTS_API_KEY";

pub struct GoogleTtsClient {
    api_key: String,
    client: Client,
}

impl GoogleTtsClient {
    /// Create a client with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Create a client from the `GOOGLE_TTS_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        std::env::var(API_KEY_ENV_VAR)
            .map_err(|_| TtsError::MissingApiKey)
            .map(Self::new)
    }

    async fn synthesize(
        &self,
        input: SynthesisInput,
        voice: &VoiceSelection,
    ) -> Result<Vec<u8>> {
        let request = SynthesizeRequest {
            input,
            voice: VoiceSelectionParams::from(voice),
            audio_config: AudioConfig {
                audio_encoding: "MP3".to_string(),
            },
        };

        let response = self
            .client
            .post(GOOGLE_TTS_URL)
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| TtsError::ApiError {
                message: format!("request failed: {}", e),
                status_code: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());

            let error_text = response.text().await.unwrap_or_default();
            let message =
                if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                    error_response.error.message
                } else {
                    error_text
                };

            if status.as_u16() == 429 {
                return Err(TtsError::RateLimited { retry_after });
            }

            return Err(TtsError::ApiError {
                message,
                status_code: Some(status.as_u16()),
            });
        }

        let api_response: SynthesizeResponse =
            response.json().await.map_err(|e| TtsError::ApiError {
                message: format!("failed to parse response: {}", e),
                status_code: None,
            })?;

        BASE64
            .decode(&api_response.audio_content)
            .map_err(|e| TtsError::InvalidPayload(e.to_string()))
    }
}

#[async_trait]
impl Synthesizer for GoogleTtsClient {
    async fn synthesize_ssml(&self, ssml: &str, voice: &VoiceSelection) -> Result<Vec<u8>> {
        self.synthesize(SynthesisInput::ssml(ssml), voice).await
    }

    async fn synthesize_text(&self, text: &str, voice: &VoiceSelection) -> Result<Vec<u8>> {
        self.synthesize(SynthesisInput::text(text), voice).await
    }

    fn name(&self) -> &'static str {
        "Google Cloud Text-to-Speech"
    }
}

// API request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest {
    input: SynthesisInput,
    voice: VoiceSelectionParams,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    ssml: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl SynthesisInput {
    fn ssml(ssml: &str) -> Self {
        Self {
            ssml: Some(ssml.to_string()),
            text: None,
        }
    }

    fn text(text: &str) -> Self {
        Self {
            ssml: None,
            text: Some(text.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelectionParams {
    language_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    ssml_gender: String,
}

impl From<&VoiceSelection> for VoiceSelectionParams {
    fn from(voice: &VoiceSelection) -> Self {
        Self {
            language_code: voice.language_code.clone(),
            name: voice.name.clone(),
            ssml_gender: voice.gender.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let voice = VoiceSelection::for_language("en-GB").with_name("en-GB-News-G");
        let request = SynthesizeRequest {
            input: SynthesisInput::ssml("<speak><s>Hi.</s></speak>"),
            voice: VoiceSelectionParams::from(&voice),
            audio_config: AudioConfig {
                audio_encoding: "MP3".to_string(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"]["ssml"], "<speak><s>Hi.</s></speak>");
        assert!(json["input"].get("text").is_none());
        assert_eq!(json["voice"]["languageCode"], "en-GB");
        assert_eq!(json["voice"]["name"], "en-GB-News-G");
        assert_eq!(json["voice"]["ssmlGender"], "NEUTRAL");
        assert_eq!(json["audioConfig"]["audioEncoding"], "MP3");
    }

    #[test]
    fn test_nameless_voice_omits_field() {
        let params = VoiceSelectionParams::from(&VoiceSelection::default());
        let json = serde_json::to_value(&params).unwrap();
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_response_decodes_base64_payload() {
        let body = r#"{"audioContent":"SUQzBAA="}"#;
        let response: SynthesizeResponse = serde_json::from_str(body).unwrap();
        let payload = BASE64.decode(&response.audio_content).unwrap();
        assert_eq!(payload, vec![0x49, 0x44, 0x33, 0x04, 0x00]);
    }

    #[test]
    fn test_error_body_parsing() {
        let body = r#"{"error":{"code":400,"message":"Invalid SSML","status":"INVALID_ARGUMENT"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "Invalid SSML");
    }

    #[test]
    fn test_backend_name() {
        assert_eq!(
            GoogleTtsClient::new("k").name(),
            "Google Cloud Text-to-Speech"
        );
    }

    #[test]
    fn test_from_env_missing_key() {
        // Use a scoped variable name to avoid interfering with a real key.
        unsafe { std::env::remove_var(API_KEY_ENV_VAR) };
        assert!(matches!(
            GoogleTtsClient::from_env(),
            Err(TtsError::MissingApiKey)
        ));
    }
}
