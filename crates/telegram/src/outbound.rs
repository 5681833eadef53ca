use {
    async_trait::async_trait,
    std::{future::Future, time::Duration},
    teloxide::{
        ApiError, RequestError,
        payloads::{SendMessageSetters, SendPhotoSetters},
        prelude::*,
        types::{ChatId, InputFile, MessageId, ParseMode, ReplyParameters},
    },
    tracing::{debug, warn},
};

use {
    chatbridge_channels::{ChannelOutbound, Error, ImagePayload, Result},
    chatbridge_chat::history::split_chars,
};

pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Outbound message sender for Telegram.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn send_chunk(
        &self,
        chat_id: ChatId,
        chunk: &str,
        reply_params: Option<&ReplyParameters>,
        rich: bool,
    ) -> std::result::Result<(), RequestError> {
        if rich {
            let result = self
                .run_request_with_retry(chat_id, "send message (markdown)", || {
                    #[allow(deprecated)]
                    let mut req = self
                        .bot
                        .send_message(chat_id, chunk)
                        .parse_mode(ParseMode::Markdown);
                    if let Some(rp) = reply_params {
                        req = req.reply_parameters(rp.clone());
                    }
                    async move { req.await }
                })
                .await;
            match result {
                Ok(_) => return Ok(()),
                Err(e) => warn!(
                    chat_id = chat_id.0,
                    error = %e,
                    "telegram markdown send failed, retrying as plain text"
                ),
            }
        }

        self.run_request_with_retry(chat_id, "send message (plain)", || {
            let mut req = self.bot.send_message(chat_id, chunk);
            if let Some(rp) = reply_params {
                req = req.reply_parameters(rp.clone());
            }
            async move { req.await }
        })
        .await?;
        Ok(())
    }

    async fn run_request_with_retry<T, F, Fut>(
        &self,
        chat_id: ChatId,
        operation: &'static str,
        mut request: F,
    ) -> std::result::Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id = chat_id.0,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id = chat_id.0,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

fn reply_params(reply_to: Option<i32>) -> Option<ReplyParameters> {
    reply_to.map(|id| ReplyParameters::new(MessageId(id)).allow_sending_without_reply())
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

fn channel_error(operation: &str, error: RequestError) -> Error {
    match error {
        RequestError::Api(ApiError::BotBlocked | ApiError::ChatNotFound) => {
            Error::rejected(format!("{operation}: {error}"))
        },
        other => Error::external(operation, other),
    }
}

#[async_trait]
impl ChannelOutbound for TelegramOutbound {
    async fn reply(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        text: &str,
        rich: bool,
    ) -> Result<()> {
        if text.is_empty() {
            return Err(Error::invalid_input("empty message"));
        }
        let chat = ChatId(chat_id);
        let rp = reply_params(reply_to);
        let chunks = split_chars(text, TELEGRAM_MAX_MESSAGE_LEN);
        debug!(
            chat_id,
            reply_to = ?reply_to,
            chunk_count = chunks.len(),
            rich,
            "telegram outbound text send"
        );

        for chunk in &chunks {
            self.send_chunk(chat, chunk, rp.as_ref(), rich)
                .await
                .map_err(|e| channel_error("send message", e))?;
        }
        Ok(())
    }

    async fn send_image(
        &self,
        chat_id: i64,
        reply_to: Option<i32>,
        image: &ImagePayload,
    ) -> Result<()> {
        let file = match image {
            ImagePayload::Url(url) => {
                let url = reqwest::Url::parse(url).map_err(Error::invalid_input)?;
                InputFile::url(url)
            },
            ImagePayload::Bytes(bytes) => InputFile::memory(bytes.clone()).file_name("image.png"),
        };
        let chat = ChatId(chat_id);
        let rp = reply_params(reply_to);

        self.run_request_with_retry(chat, "send photo", || {
            let mut req = self.bot.send_photo(chat, file.clone());
            if let Some(rp) = &rp {
                req = req.reply_parameters(rp.clone());
            }
            async move { req.await }
        })
        .await
        .map_err(|e| channel_error("send photo", e))?;
        Ok(())
    }

    async fn notify(&self, target: i64, text: &str) -> Result<()> {
        let chat = ChatId(target);
        for chunk in split_chars(text, TELEGRAM_MAX_MESSAGE_LEN) {
            self.run_request_with_retry(chat, "send notification", || {
                let req = self.bot.send_message(chat, chunk.clone());
                async move { req.await }
            })
            .await
            .map_err(|e| channel_error("send notification", e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        mockito::{Matcher, Server},
        rstest::rstest,
        serde_json::json,
    };

    fn sent_message() -> String {
        json!({
            "ok": true,
            "result": {
                "message_id": 10,
                "date": 1,
                "chat": { "id": 42, "type": "private", "first_name": "Alice" },
                "text": "ok"
            }
        })
        .to_string()
    }

    fn outbound(server: &Server) -> TelegramOutbound {
        let api_url = reqwest::Url::parse(&format!("{}/", server.url())).expect("parse api url");
        TelegramOutbound::new(Bot::new("test-token").set_api_url(api_url))
    }

    fn send_message_path() -> Matcher {
        Matcher::Regex("(?i)/bottest-token/sendmessage$".into())
    }

    #[test]
    fn retry_after_duration_extracts_wait() {
        let err = RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(42));
        assert_eq!(retry_after_duration(&err), Some(Duration::from_secs(42)));
    }

    #[test]
    fn retry_after_duration_ignores_other_errors() {
        let err = RequestError::Io(std::io::Error::other("boom"));
        assert_eq!(retry_after_duration(&err), None);
    }

    #[rstest]
    #[case(Some(5), true)]
    #[case(None, false)]
    fn reply_params_follow_reply_to(#[case] reply_to: Option<i32>, #[case] expected: bool) {
        let params = reply_params(reply_to);
        assert_eq!(params.is_some(), expected);
        if let Some(params) = params {
            assert_eq!(params.message_id, MessageId(5));
            assert_eq!(params.allow_sending_without_reply, Some(true));
        }
    }

    #[test]
    fn blocked_bot_is_rejected() {
        let err = channel_error("send message", RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(err, Error::Rejected { .. }));
    }

    #[tokio::test]
    async fn plain_reply_threads_under_message() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", send_message_path())
            .match_body(Matcher::PartialJson(json!({
                "chat_id": 42,
                "text": "hello",
                "reply_parameters": { "message_id": 5 }
            })))
            .with_body(sent_message())
            .expect(1)
            .create_async()
            .await;

        outbound(&server)
            .reply(42, Some(5), "hello", false)
            .await
            .expect("reply");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn markdown_reply_falls_back_to_plain_text() {
        let mut server = Server::new_async().await;
        let markdown = server
            .mock("POST", send_message_path())
            .match_body(Matcher::PartialJson(json!({ "parse_mode": "Markdown" })))
            .with_body(
                json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: can't parse entities: Can't find end of the entity"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let plain = server
            .mock("POST", send_message_path())
            .match_body(Matcher::PartialJson(json!({ "text": "*broken" })))
            .with_body(sent_message())
            .expect(1)
            .create_async()
            .await;

        outbound(&server)
            .reply(42, None, "*broken", true)
            .await
            .expect("reply");
        markdown.assert_async().await;
        plain.assert_async().await;
    }

    #[tokio::test]
    async fn long_replies_are_chunked() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", send_message_path())
            .with_body(sent_message())
            .expect(2)
            .create_async()
            .await;

        let text = "a".repeat(TELEGRAM_MAX_MESSAGE_LEN + 10);
        outbound(&server)
            .reply(42, None, &text, false)
            .await
            .expect("reply");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_reply_is_invalid() {
        let server = Server::new_async().await;
        let err = outbound(&server).reply(42, None, "", false).await;
        assert!(matches!(err, Err(Error::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn notify_sends_plain_message_to_target() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", send_message_path())
            .match_body(Matcher::PartialJson(json!({ "chat_id": 1, "text": "heads up" })))
            .with_body(sent_message())
            .expect(1)
            .create_async()
            .await;

        outbound(&server)
            .notify(1, "heads up")
            .await
            .expect("notify");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_errors_surface_as_channel_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", send_message_path())
            .with_body(
                json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: chat not found"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = outbound(&server).notify(1, "hello").await;
        assert!(matches!(err, Err(Error::Rejected { .. })));
    }
}
