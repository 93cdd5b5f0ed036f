use assert_matches::assert_matches;
use coach_platform::services::video_metadata_service::VideoProvider;
use coach_platform::services::VideoMetadataService;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn service_for(server: &MockServer) -> VideoMetadataService {
    VideoMetadataService::new(
        format!("{}/youtube/oembed", server.uri()),
        format!("{}/vimeo/oembed.json", server.uri()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_youtube_metadata_is_fetched() {
    let server = MockServer::start().await;
    let video_url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    Mock::given(method("GET"))
        .and(path("/youtube/oembed"))
        .and(query_param("url", video_url))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Kick serve breakdown",
            "thumbnail_url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
            "type": "video"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = service_for(&server).await.fetch(video_url).await.unwrap().unwrap();

    assert_eq!(metadata.provider, VideoProvider::YouTube);
    assert_eq!(metadata.title.as_deref(), Some("Kick serve breakdown"));
    assert_eq!(
        metadata.thumbnail_url.as_deref(),
        Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
    );
    assert_eq!(metadata.duration_seconds, None);
}

#[tokio::test]
async fn test_vimeo_duration_is_read() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vimeo/oembed.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "Footwork ladder",
            "thumbnail_url": "https://i.vimeocdn.com/video/1.jpg",
            "duration": 312
        })))
        .mount(&server)
        .await;

    let metadata = service_for(&server)
        .await
        .fetch("https://vimeo.com/76979871")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(metadata.provider, VideoProvider::Vimeo);
    assert_eq!(metadata.duration_seconds, Some(312));
}

#[tokio::test]
async fn test_blank_title_is_dropped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vimeo/oembed.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "title": "  " })))
        .mount(&server)
        .await;

    let metadata = service_for(&server)
        .await
        .fetch("https://vimeo.com/76979871")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(metadata.title, None);
}

#[tokio::test]
async fn test_provider_error_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/youtube/oembed"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = service_for(&server).await.fetch("https://youtu.be/dQw4w9WgXcQ").await;

    assert_matches!(result, Err(_));
}

#[tokio::test]
async fn test_unrecognised_url_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = service_for(&server)
        .await
        .fetch("https://example.com/clip.mp4")
        .await
        .unwrap();

    assert_eq!(result, None);
}
