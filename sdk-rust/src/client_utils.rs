use crate::LanguageModelError;
use eventsource_stream::Eventsource;
use futures::{stream::StreamExt, Stream};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::pin::Pin;

/// Turn any non-success status (including 5xx) into a `StatusCode` error
/// carrying the response body.
async fn check_status(response: Response) -> Result<Response, LanguageModelError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(LanguageModelError::StatusCode(
            status,
            response.text().await.unwrap_or_default(),
        ))
    }
}

/// Create a JSON request, parse the response.
/// Throws error on non OK status code.
pub async fn send_json<T: Serialize, R: DeserializeOwned>(
    client: &Client,
    url: &str,
    data: &T,
    headers: reqwest::header::HeaderMap,
) -> Result<R, LanguageModelError> {
    let response = client.post(url).headers(headers).json(data).send().await?;
    let response = check_status(response).await?;
    Ok(response.json::<R>().await?)
}

/// Create a JSON request that returns a typed stream of parsed SSE chunks.
/// Throws error on non OK status code before any chunk is produced.
pub async fn send_sse_stream<T: Serialize, R: DeserializeOwned + Send + 'static>(
    client: &Client,
    url: &str,
    data: &T,
    headers: reqwest::header::HeaderMap,
    provider: &'static str,
) -> Result<Pin<Box<dyn Stream<Item = Result<R, LanguageModelError>> + Send>>, LanguageModelError> {
    let response = client.post(url).headers(headers).json(data).send().await?;
    let mut sse_stream = check_status(response).await?.bytes_stream().eventsource();

    let stream = async_stream::try_stream! {
        while let Some(event) = sse_stream.next().await {
            match event {
                Ok(event) => {
                    if event.data.is_empty() {
                        continue;
                    }
                    if event.data == "[DONE]" {
                        break;
                    }

                    let chunk: R = serde_json::from_str(&event.data)
                        .map_err(|e| {
                            LanguageModelError::Invariant(
                                provider,
                                format!("Failed to parse stream chunk: {e}")
                            )
                        })?;

                    yield chunk;
                }
                Err(eventsource_stream::EventStreamError::Utf8(_)) => {
                    Err(LanguageModelError::Invariant(
                        provider,
                        "Receive invalid UTF-8 sequence for stream data".to_string()
                    ))?;
                }
                Err(eventsource_stream::EventStreamError::Parser(error)) => {
                    Err(LanguageModelError::Invariant(
                        provider,
                        format!("Receive invalid EventStream data: {error}")
                    ))?;
                }
                Err(eventsource_stream::EventStreamError::Transport(e)) => {
                    Err(LanguageModelError::Transport(e))?;
                }
            }
        }
    };

    Ok(Box::pin(stream))
}
