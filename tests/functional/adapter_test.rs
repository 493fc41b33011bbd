//! Functional tests for the provider adapters against a mock HTTP server

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use blog_image_engine::config::ProviderConfig;
use blog_image_engine::generator::native::NativeImageGenerator;
use blog_image_engine::generator::openai_chat::OpenAiChatGenerator;
use blog_image_engine::generator::openai_image::OpenAiImageGenerator;
use blog_image_engine::{ImageGenerator, ImageRequest};
use tokio_test::assert_ok;

fn provider(kind: &str, base_url: &str) -> ProviderConfig {
    serde_json::from_value(json!({
        "type": kind,
        "api_key": "sk-test",
        "base_url": base_url
    }))
    .unwrap()
}

fn request(prompt: &str) -> ImageRequest {
    ImageRequest {
        prompt: prompt.to_string(),
        size: "1024x1024".to_string(),
        aspect_ratio: "16:9".to_string(),
        temperature: 1.0,
        ..Default::default()
    }
}

// ---------- OpenAI images endpoint ----------

#[tokio::test]
async fn test_images_api_decodes_b64_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "n": 1,
            "size": "1024x1024",
            "response_format": "b64_json"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"b64_json": "QQ=="}]})),
        )
        .mount(&server)
        .await;

    let generator = OpenAiImageGenerator::new(&provider("openai_image", &server.uri())).unwrap();
    let bytes = assert_ok!(generator.generate(&request("a lighthouse")).await);
    assert_eq!(bytes, vec![0x41]);
}

#[tokio::test]
async fn test_images_api_follows_url_response() {
    let server = MockServer::start().await;
    let image_url = format!("{}/files/out.png", server.uri());

    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"url": image_url}]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/out.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNGDATA".to_vec()))
        .mount(&server)
        .await;

    let generator = OpenAiImageGenerator::new(&provider("openai_image", &server.uri())).unwrap();
    let bytes = generator.generate(&request("a lighthouse")).await.unwrap();
    assert_eq!(bytes, b"PNGDATA");
}

#[tokio::test]
async fn test_images_api_rejects_empty_data() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let generator = OpenAiImageGenerator::new(&provider("openai_image", &server.uri())).unwrap();
    let error = generator.generate(&request("x")).await.unwrap_err();
    assert!(error.to_string().contains("no image data"));
}

#[tokio::test]
async fn test_images_api_surfaces_http_failures_with_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let generator = OpenAiImageGenerator::new(&provider("openai_image", &server.uri())).unwrap();
    let error = generator.generate(&request("x")).await.unwrap_err();
    assert_eq!(error.status(), Some(429));
    assert!(error.is_rate_limited());
    assert!(error.to_string().contains("status: 429"));
}

#[tokio::test]
async fn test_images_api_custom_endpoint_path() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/custom/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": [{"b64_json": "QQ=="}]})),
        )
        .mount(&server)
        .await;

    let mut config = provider("openai_image", &format!("{}/v1", server.uri()));
    config.endpoint = Some("custom/generate".to_string());

    let generator = OpenAiImageGenerator::new(&config).unwrap();
    assert!(generator.generate(&request("x")).await.is_ok());
}

// ---------- OpenAI chat endpoint ----------

#[tokio::test]
async fn test_chat_api_extracts_markdown_image_link() {
    let server = MockServer::start().await;
    let reply = format!("Here you go: ![cover]({}/gen/cover.png)", server.uri());

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gen/cover.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"COVER".to_vec()))
        .mount(&server)
        .await;

    let generator = OpenAiChatGenerator::new(&provider("openai_chat", &server.uri())).unwrap();
    let bytes = generator.generate(&request("a cover")).await.unwrap();
    assert_eq!(bytes, b"COVER");
}

#[tokio::test]
async fn test_chat_api_decodes_data_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "data:image/png;base64,QQ=="}}]
        })))
        .mount(&server)
        .await;

    let generator = OpenAiChatGenerator::new(&provider("openai_chat", &server.uri())).unwrap();
    let bytes = generator.generate(&request("x")).await.unwrap();
    assert_eq!(bytes, vec![0x41]);
}

#[tokio::test]
async fn test_chat_api_downloads_bare_url() {
    let server = MockServer::start().await;
    let reply = format!("{}/direct.png", server.uri());

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": reply}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/direct.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"DIRECT".to_vec()))
        .mount(&server)
        .await;

    let generator = OpenAiChatGenerator::new(&provider("openai_chat", &server.uri())).unwrap();
    let bytes = generator.generate(&request("x")).await.unwrap();
    assert_eq!(bytes, b"DIRECT");
}

#[tokio::test]
async fn test_chat_api_rejects_reply_without_image() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Sorry, I cannot draw that."}}]
        })))
        .mount(&server)
        .await;

    let generator = OpenAiChatGenerator::new(&provider("openai_chat", &server.uri())).unwrap();
    let error = generator.generate(&request("x")).await.unwrap_err();
    assert!(error.to_string().contains("Cannot extract image data"));
}

#[tokio::test]
async fn test_chat_api_distinguishes_auth_and_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let generator = OpenAiChatGenerator::new(&provider("openai_chat", &server.uri())).unwrap();
    let error = generator.generate(&request("x")).await.unwrap_err();
    assert!(error.to_string().contains("authentication failed"));
    assert!(!error.is_rate_limited());

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("limited"))
        .mount(&server)
        .await;

    let error = generator.generate(&request("x")).await.unwrap_err();
    assert!(error.to_string().contains("quota or rate limit"));
    assert!(error.is_rate_limited());
}

// ---------- Native image endpoint ----------

#[tokio::test]
async fn test_native_api_decodes_inline_image() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(
            "/v1beta/models/gemini-3-pro-image-preview:generateContent",
        ))
        .and(header("x-goog-api-key", "sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "here is your image"},
                    {"inlineData": {"mimeType": "image/png", "data": "QQ=="}}
                ]},
                "finishReason": "STOP"
            }]
        })))
        .mount(&server)
        .await;

    let generator = NativeImageGenerator::new(&provider("native_image", &server.uri())).unwrap();
    let bytes = generator.generate(&request("a lighthouse")).await.unwrap();
    assert_eq!(bytes, vec![0x41]);
}

#[tokio::test]
async fn test_native_api_reports_safety_block() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(
            "/v1beta/models/gemini-3-pro-image-preview:generateContent",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let generator = NativeImageGenerator::new(&provider("native_image", &server.uri())).unwrap();
    let error = generator.generate(&request("x")).await.unwrap_err();
    assert!(error.to_string().contains("safety filter"));
}

#[tokio::test]
async fn test_native_api_sends_references_as_inline_parts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(
            "/v1beta/models/gemini-3-pro-image-preview:generateContent",
        ))
        .and(body_partial_json(json!({
            "contents": [{"parts": [
                {"text": "styled page"},
                {"inline_data": {"mimeType": "image/png", "data": "AQID"}}
            ]}],
            "generationConfig": {"imageConfig": {"aspectRatio": "16:9"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "QQ=="}}]}
            }]
        })))
        .mount(&server)
        .await;

    let generator = NativeImageGenerator::new(&provider("native_image", &server.uri())).unwrap();
    let mut req = request("styled page");
    req.references = vec![vec![1, 2, 3]];

    assert!(generator.generate(&req).await.is_ok());
}

#[tokio::test]
async fn test_native_api_auth_failure_diagnostics() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(
            "/v1beta/models/gemini-3-pro-image-preview:generateContent",
        ))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let generator = NativeImageGenerator::new(&provider("native_image", &server.uri())).unwrap();
    let error = generator.generate(&request("x")).await.unwrap_err();
    assert_eq!(error.status(), Some(403));
    assert!(error.to_string().contains("authentication failed"));
}
