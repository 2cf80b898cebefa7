use codecanvas_sdk::{
    google::{GoogleModel, GoogleModelOptions},
    LanguageModel, LanguageModelError, LanguageModelInput, Message, ModelUsage, Part,
};
use futures::StreamExt;
use std::env;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

/// Serve a single canned HTTP response and hand back the raw request text.
async fn serve_once(
    status_line: &'static str,
    content_type: &'static str,
    body: String,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let base_url = format!("http://{}", listener.local_addr().expect("local addr"));

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept connection");
        let request = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        socket.shutdown().await.ok();
        request
    });

    (base_url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = socket.read(&mut chunk).await.expect("read request");
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&buffer);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

fn model_at(base_url: String) -> GoogleModel {
    GoogleModel::new(
        "gemini-test",
        GoogleModelOptions {
            api_key: "test-key".to_string(),
            base_url: Some(base_url),
            ..Default::default()
        },
    )
}

fn user_input(text: &str) -> LanguageModelInput {
    LanguageModelInput {
        system_prompt: Some("Only output HTML.".to_string()),
        messages: vec![Message::user([Part::text(text)])],
        temperature: Some(0.2),
        ..Default::default()
    }
}

#[tokio::test]
async fn generate_sends_request_and_maps_response() {
    let (base_url, server) = serve_once(
        "200 OK",
        "application/json",
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"code_generation"}]}}],"usageMetadata":{"promptTokenCount":42,"candidatesTokenCount":2}}"#
            .to_string(),
    )
    .await;

    let response = model_at(base_url)
        .generate(user_input("build a button"))
        .await
        .expect("generate should succeed");

    assert_eq!(response.text(), "code_generation");
    assert_eq!(
        response.usage,
        Some(ModelUsage {
            input_tokens: 42,
            output_tokens: 2,
        })
    );

    let request = server.await.expect("server task");
    assert!(request.starts_with("POST /models/gemini-test:generateContent "));
    assert!(request.to_lowercase().contains("x-goog-api-key: test-key"));
    assert!(request.contains(r#""systemInstruction""#));
    assert!(request.contains(r#""temperature":0.2"#));
}

#[tokio::test]
async fn stream_yields_text_deltas() {
    let body = [
        r#"data: {"candidates":[{"content":{"role":"model","parts":[{"text":"<button>"}]}}]}"#,
        r#"data: {"candidates":[{"content":{"role":"model","parts":[{"text":"Go</button>"}]}}],"usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":3}}"#,
    ]
    .join("\n\n")
        + "\n\n";
    let (base_url, server) = serve_once("200 OK", "text/event-stream", body).await;

    let partials: Vec<_> = model_at(base_url)
        .stream(user_input("build a button"))
        .await
        .expect("stream should open")
        .collect()
        .await;

    let text: String = partials
        .iter()
        .filter_map(|partial| partial.as_ref().ok()?.text_delta())
        .collect();
    assert_eq!(text, "<button>Go</button>");
    assert!(partials.iter().any(|partial| matches!(
        partial,
        Ok(partial) if partial.usage == Some(ModelUsage { input_tokens: 5, output_tokens: 3 })
    )));

    let request = server.await.expect("server task");
    assert!(request.starts_with("POST /models/gemini-test:streamGenerateContent?alt=sse "));
}

#[tokio::test]
async fn overloaded_status_keeps_code_and_body_in_error_text() {
    let (base_url, _server) = serve_once(
        "503 Service Unavailable",
        "application/json",
        r#"{"error":{"code":503,"message":"The model is overloaded. Please try again later.","status":"UNAVAILABLE"}}"#
            .to_string(),
    )
    .await;

    let Err(error) = model_at(base_url).stream(user_input("build a button")).await else {
        panic!("expected status error");
    };

    assert!(matches!(error, LanguageModelError::StatusCode(status, _) if status.as_u16() == 503));
    let message = error.to_string();
    assert!(message.contains("503"));
    assert!(message.contains("overloaded"));
}

#[tokio::test]
async fn in_band_stream_error_is_yielded_as_error() {
    let body = concat!(
        r#"data: {"error":{"code":503,"message":"The model is overloaded. Please try again later.","status":"UNAVAILABLE"}}"#,
        "\n\n"
    )
    .to_string();
    let (base_url, _server) = serve_once("200 OK", "text/event-stream", body).await;

    let items: Vec<_> = model_at(base_url)
        .stream(user_input("build a button"))
        .await
        .expect("stream should open")
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    let Some(Err(error)) = items.into_iter().next() else {
        panic!("expected the stream to yield an error");
    };
    assert!(matches!(error, LanguageModelError::StatusCode(status, _) if status.as_u16() == 503));
    let message = error.to_string();
    assert!(message.contains("503"));
    assert!(message.contains("overloaded"));
}

#[tokio::test]
#[ignore = "calls the live Gemini API; requires GEMINI_API_KEY"]
async fn live_generate_text() {
    dotenvy::dotenv().ok();
    let api_key = env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set");
    let model = GoogleModel::new(
        "gemini-2.5-flash",
        GoogleModelOptions {
            api_key,
            ..Default::default()
        },
    );

    let response = model
        .generate(LanguageModelInput {
            messages: vec![Message::user([Part::text("Reply with the single word: chat")])],
            temperature: Some(0.0),
            ..Default::default()
        })
        .await
        .expect("generate should succeed");

    assert!(response.text().to_lowercase().contains("chat"));
}
