use std::time::Duration;

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD},
    chatbridge_common::Message,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, trace, warn},
};

use crate::{
    backend::{CompletionRequest, GeneratedImage, ImageBackend, TextBackend},
    error::{BackendError, Result},
};

/// OpenAI-compatible HTTP backend serving both chat completions and images.
pub struct OpenAiProvider {
    api_key: Secret<String>,
    base_url: String,
    image_size: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageGeneration {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

impl OpenAiProvider {
    pub fn new(
        api_key: Secret<String>,
        base_url: impl Into<String>,
        image_size: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            image_size: image_size.into(),
            client,
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, path, body = %body, "backend API error");
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn wire_messages(system_prompt: &str, messages: &[Message]) -> Vec<serde_json::Value> {
    let system = (!system_prompt.is_empty()).then(|| Message::system(system_prompt));
    system
        .iter()
        .chain(messages)
        .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
        .collect()
}

#[async_trait]
impl TextBackend for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": wire_messages(&request.system_prompt, &request.messages),
        });
        debug!(
            model = %request.model,
            messages_count = request.messages.len(),
            "chat completion request"
        );

        let completion: ChatCompletion = self.post("/chat/completions", &body).await?.json().await?;
        trace!(choices = completion.choices.len(), "chat completion response");

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| BackendError::invalid("completion has no content"))
    }
}

#[async_trait]
impl ImageBackend for OpenAiProvider {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        let body = serde_json::json!({
            "prompt": prompt,
            "n": 1,
            "size": self.image_size,
        });
        debug!(size = %self.image_size, "image generation request");

        let generated: ImageGeneration =
            self.post("/images/generations", &body).await?.json().await?;
        let Some(image) = generated.data.into_iter().next() else {
            return Err(BackendError::invalid("image response has no data"));
        };

        match (image.url, image.b64_json) {
            (Some(url), _) => Ok(GeneratedImage::Url(url)),
            (None, Some(encoded)) => STANDARD
                .decode(encoded.as_bytes())
                .map(GeneratedImage::Bytes)
                .map_err(BackendError::invalid),
            (None, None) => Err(BackendError::invalid("image has neither url nor data")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, mockito::Matcher};

    fn provider(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new(
            Secret::new("test-key".to_string()),
            base_url,
            "256x256",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: "be brief".into(),
            messages: vec![
                Message::user("hi"),
                Message::assistant("hello"),
                Message::user("how are you?"),
            ],
            temperature: 0.5,
            model: "gpt-test".into(),
        }
    }

    #[tokio::test]
    async fn complete_sends_system_prompt_first() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "gpt-test",
                "messages": [
                    { "role": "system", "content": "be brief" },
                    { "role": "user", "content": "hi" },
                    { "role": "assistant", "content": "hello" },
                    { "role": "user", "content": "how are you?" }
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": " fine \n" } }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let text = provider(&server.url()).complete(request()).await.unwrap();
        assert_eq!(text, "fine");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn complete_maps_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let err = provider(&server.url())
            .complete(request())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 429, .. }));
        assert!(err.is_transient());
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn complete_rejects_empty_choices() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .complete(request())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn generate_image_returns_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/images/generations")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "prompt": "a red fox",
                "n": 1,
                "size": "256x256"
            })))
            .with_status(200)
            .with_body(r#"{"data": [{"url": "https://img.example/fox.png"}]}"#)
            .create_async()
            .await;

        let image = provider(&server.url())
            .generate_image("a red fox")
            .await
            .unwrap();
        assert_eq!(
            image,
            GeneratedImage::Url("https://img.example/fox.png".into())
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_image_decodes_inline_bytes() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/images/generations")
            .with_status(200)
            .with_body(r#"{"data": [{"b64_json": "aGVsbG8="}]}"#)
            .create_async()
            .await;

        let image = provider(&server.url()).generate_image("x").await.unwrap();
        assert_eq!(image, GeneratedImage::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let wire = wire_messages("", &[Message::user("hi")]);
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "user");
    }
}
