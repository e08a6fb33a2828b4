use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;

use revoice::gateway::{GatewayClient, RewriteRequest, ToneGateway};
use revoice::RevoiceError;

fn client_for(server: &mockito::ServerGuard) -> GatewayClient {
    GatewayClient::with_base_url(server.url(), 5, std::env::temp_dir())
        .expect("failed to build client")
}

#[tokio::test]
async fn list_tones_parses_the_backend_payload() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/tones")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {
                    "id": "professional",
                    "name": "👔 Professional",
                    "description": "Formal business tone",
                    "emoji": "👔",
                    "language": "en"
                },
                {
                    "id": "urdu_poetry",
                    "name": "💕 اردو شاعری",
                    "description": "Romantic Urdu poetry",
                    "emoji": "💕",
                    "language": "ur"
                }
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let tones = client_for(&server).list_tones().await.expect("listing failed");
    mock.assert_async().await;

    assert_eq!(tones.len(), 2);
    assert_eq!(tones[0].id, "professional");
    assert_eq!(tones[1].language.as_deref(), Some("ur"));
}

#[tokio::test]
async fn list_tones_transport_failure_is_a_network_error() {
    // Nothing listens here; the connection is refused.
    let client = GatewayClient::with_base_url("http://127.0.0.1:1", 1, std::env::temp_dir())
        .expect("failed to build client");
    let err = client.list_tones().await.expect_err("expected a failure");
    assert!(matches!(err, RevoiceError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn health_check_recognizes_only_healthy() {
    let mut server = mockito::Server::new_async().await;

    let healthy = server
        .mock("GET", "/api/health")
        .with_body(json!({"status": "healthy", "version": "3.0"}).to_string())
        .create_async()
        .await;
    assert!(client_for(&server).health_check().await);
    healthy.assert_async().await;

    let degraded = server
        .mock("GET", "/api/health")
        .with_body(json!({"status": "degraded"}).to_string())
        .create_async()
        .await;
    assert!(!client_for(&server).health_check().await);
    degraded.assert_async().await;
}

#[tokio::test]
async fn health_check_swallows_transport_failures() {
    let client = GatewayClient::with_base_url("http://127.0.0.1:1", 1, std::env::temp_dir())
        .expect("failed to build client");
    assert!(!client.health_check().await);
}

#[tokio::test]
async fn rewrite_sends_the_expected_body_and_maps_the_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/rewrite")
        .match_body(mockito::Matcher::Json(json!({
            "text": "We need to schedule a meeting to discuss the Q4 results.",
            "tone": "professional"
        })))
        .with_body(
            json!({
                "success": true,
                "original": "We need to schedule a meeting to discuss the Q4 results.",
                "rewritten": "📊 We need to schedule a meeting to discuss the Q4 results.",
                "tone": "professional",
                "tone_name": "👔 Professional",
                "language": "en"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let request = RewriteRequest {
        text: "We need to schedule a meeting to discuss the Q4 results.".to_string(),
        tone: "professional".to_string(),
    };
    let result = client_for(&server)
        .rewrite(&request)
        .await
        .expect("rewrite failed");
    mock.assert_async().await;

    assert_eq!(
        result.rewritten,
        "📊 We need to schedule a meeting to discuss the Q4 results."
    );
    assert_eq!(result.tone_name, "👔 Professional");
    assert_eq!(result.language.as_deref(), Some("en"));
    assert_eq!(result.word_count_original, None);
}

#[tokio::test]
async fn rewrite_surfaces_the_backend_message_verbatim() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/rewrite")
        .with_status(500)
        .with_body(json!({"error": "the model exploded"}).to_string())
        .create_async()
        .await;

    let request = RewriteRequest {
        text: "hello".to_string(),
        tone: "professional".to_string(),
    };
    let err = client_for(&server)
        .rewrite(&request)
        .await
        .expect_err("expected a failure");
    match err {
        RevoiceError::Backend(message) => assert_eq!(message, "the model exploded"),
        other => panic!("expected a backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn rewrite_failure_without_a_message_gets_a_generic_one() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/rewrite")
        .with_body(json!({"success": false}).to_string())
        .create_async()
        .await;

    let request = RewriteRequest {
        text: "hello".to_string(),
        tone: "professional".to_string(),
    };
    let err = client_for(&server)
        .rewrite(&request)
        .await
        .expect_err("expected a failure");
    match err {
        RevoiceError::Backend(message) => assert!(!message.is_empty()),
        other => panic!("expected a backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn rewrite_rejects_empty_text_before_any_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/rewrite")
        .expect(0)
        .create_async()
        .await;

    let request = RewriteRequest {
        text: "   ".to_string(),
        tone: "professional".to_string(),
    };
    let err = client_for(&server)
        .rewrite(&request)
        .await
        .expect_err("expected a failure");
    assert!(matches!(err, RevoiceError::Validation(_)), "got {err:?}");
    mock.assert_async().await;
}

#[tokio::test]
async fn synthesize_inline_decodes_the_base64_payload() {
    let audio = b"ID3\x03fake mp3 payload".to_vec();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate-voice")
        .match_body(mockito::Matcher::Json(json!({
            "text": "hello",
            "language": "en"
        })))
        .with_body(
            json!({
                "success": true,
                "audio": BASE64.encode(&audio),
                "format": "mp3",
                "language": "en"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let bytes = client_for(&server)
        .synthesize_inline("hello", "en")
        .await
        .expect("synthesis failed");
    mock.assert_async().await;
    assert_eq!(bytes, audio);
}

#[tokio::test]
async fn synthesize_inline_reports_backend_failures() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/generate-voice")
        .with_status(500)
        .with_body(json!({"error": "no tts engine"}).to_string())
        .create_async()
        .await;

    let err = client_for(&server)
        .synthesize_inline("hello", "en")
        .await
        .expect_err("expected a failure");
    match err {
        RevoiceError::Backend(message) => assert_eq!(message, "no tts engine"),
        other => panic!("expected a backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn download_streams_a_timestamped_mp3_into_the_download_dir() {
    let payload = b"\xff\xfbbinary mpeg frames".to_vec();
    let dir = tempfile::tempdir().expect("no tempdir");

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/download-voice")
        .match_body(mockito::Matcher::Json(json!({
            "text": "hello",
            "language": "ur"
        })))
        .with_header("content-type", "audio/mpeg")
        .with_body(payload.clone())
        .create_async()
        .await;

    let client = GatewayClient::with_base_url(server.url(), 5, dir.path())
        .expect("failed to build client");
    let path = client
        .synthesize_downloadable("hello", "ur")
        .await
        .expect("download failed");
    mock.assert_async().await;

    let name = path.file_name().and_then(|n| n.to_str()).unwrap();
    assert!(name.starts_with("brand_voice_ur_"), "got {name}");
    assert!(name.ends_with(".mp3"), "got {name}");
    assert_eq!(std::fs::read(&path).expect("file missing"), payload);
}

#[tokio::test]
async fn download_failure_is_a_backend_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/download-voice")
        .with_status(500)
        .with_body(json!({"error": "tts backend offline"}).to_string())
        .create_async()
        .await;

    let err = client_for(&server)
        .synthesize_downloadable("hello", "en")
        .await
        .expect_err("expected a failure");
    match err {
        RevoiceError::Backend(message) => assert_eq!(message, "tts backend offline"),
        other => panic!("expected a backend error, got {other:?}"),
    }
}
