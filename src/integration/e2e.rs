//! End-to-end request scenarios

use axum::body::Body;
use axum::http::{header, Request, StatusCode};

use crate::engine::fake::FakeEngine;
use crate::engine::{FrameRate, FrameSize};

use super::fixtures::{
    body_bytes, body_json, without_request_id, zip_entries, MultipartBody, TestApp,
};

fn captioned_upload(caption: &str) -> MultipartBody {
    MultipartBody::new().video().text("text_two", caption)
}

#[tokio::test]
async fn test_full_source_in_fixed_segments() {
    let app = TestApp::new(FakeEngine::new(150.0));

    let request = captioned_upload("hello")
        .text("output_duration", "60")
        .post("/upload_video");
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/zip"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"output_videos.zip\""
    );

    let entries = zip_entries(&body_bytes(response).await);
    let names: Vec<String> = entries.iter().map(|(n, _)| without_request_id(n)).collect();
    assert_eq!(
        names,
        vec![
            "output_segment_hello_<id>_part1.mp4",
            "output_segment_hello_<id>_part2.mp4",
            "output_segment_hello_<id>_part3.mp4",
        ]
    );

    assert!(entries[0].1.contains("composite 1920x1296 60.000s"));
    assert!(entries[0].1.contains("cut 0.000..60.000 1280x720"));
    assert!(entries[0].1.contains("\"Part 1\""));
    assert!(entries[1].1.contains("cut 60.000..120.000"));
    assert!(entries[2].1.contains("composite 1920x1296 30.000s"));
    assert!(entries[2].1.contains("cut 120.000..150.000"));
    assert!(entries[2].1.contains("\"Part 3\""));
    assert!(entries[2].1.contains("\"hello\""));

    // Source closed, staging removed, artifacts retained
    assert_eq!(app.engine.opened(), 1);
    assert_eq!(app.engine.closed(), 1);
    assert!(app.upload_entries().is_empty());
    assert_eq!(app.output_files().len(), 3);
}

#[tokio::test]
async fn test_start_only_covers_rest_of_source() {
    let app = TestApp::new(FakeEngine::new(90.0));

    let request = captioned_upload("tail").text("start_time", "1m").post("/upload_video");
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let entries = zip_entries(&body_bytes(response).await);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].1.contains("composite 1920x1296 30.000s"));
    assert!(entries[0].1.contains("cut 60.000..90.000"));
}

#[tokio::test]
async fn test_mov_upload_rejected_without_writes() {
    let app = TestApp::new(FakeEngine::new(60.0));

    let request = MultipartBody::new()
        .file("video", "clip.mov", b"quicktime")
        .text("text_two", "hello")
        .post("/upload_video");
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "error": "Invalid file format" })
    );
    assert!(app.upload_entries().is_empty());
    assert!(app.output_files().is_empty());
    assert_eq!(app.engine.opened(), 0);
}

#[tokio::test]
async fn test_inverted_range_produces_nothing() {
    let app = TestApp::new(FakeEngine::new(300.0));

    let request = captioned_upload("hello")
        .text("start_time", "2m")
        .text("end_time", "1m")
        .post("/upload_video");
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert!(error["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid time range"));

    assert!(app.engine.encoded().is_empty());
    assert!(app.output_files().is_empty());
    assert!(app.upload_entries().is_empty());
    assert_eq!(app.engine.closed(), app.engine.opened());
}

#[tokio::test]
async fn test_repeated_requests_produce_identical_content() {
    let app = TestApp::new(FakeEngine::new(100.0));

    let mut runs = Vec::new();
    for _ in 0..2 {
        let request = captioned_upload("same")
            .text("output_duration", "40")
            .post("/upload_video");
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        runs.push(zip_entries(&body_bytes(response).await));
    }

    assert_eq!(runs[0].len(), 3);
    for (first, second) in runs[0].iter().zip(&runs[1]) {
        assert_ne!(first.0, second.0);
        assert_eq!(without_request_id(&first.0), without_request_id(&second.0));
        assert_eq!(first.1, second.1);
    }
}

#[tokio::test]
async fn test_concurrent_requests_never_collide() {
    let app = TestApp::new(FakeEngine::new(120.0));

    let first = app.send(
        captioned_upload("same")
            .text("output_duration", "30")
            .post("/upload_video"),
    );
    let second = app.send(
        captioned_upload("same")
            .text("output_duration", "30")
            .post("/upload_video"),
    );
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);

    let mut names: Vec<String> = zip_entries(&body_bytes(first).await)
        .into_iter()
        .chain(zip_entries(&body_bytes(second).await))
        .map(|(name, _)| name)
        .collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 8);
    assert_eq!(app.output_files(), names);
}

#[tokio::test]
async fn test_missing_caption_rejected() {
    let app = TestApp::new(FakeEngine::new(60.0));

    let response = app
        .send(MultipartBody::new().video().post("/upload_video"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "error": "Missing video or text inputs" })
    );
    assert!(app.upload_entries().is_empty());
}

#[tokio::test]
async fn test_missing_fields_checked_before_format() {
    let app = TestApp::new(FakeEngine::new(60.0));

    let request = MultipartBody::new()
        .file("video", "clip.mov", b"quicktime")
        .post("/upload_video");
    let response = app.send(request).await;

    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "error": "Missing video or text inputs" })
    );
}

#[tokio::test]
async fn test_process_video_raw_segments() {
    let app = TestApp::new(FakeEngine::new(150.0));

    let response = app
        .send(MultipartBody::new().video().post("/process-video"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let entries = zip_entries(&body_bytes(response).await);
    let names: Vec<String> = entries.iter().map(|(n, _)| without_request_id(n)).collect();
    assert_eq!(
        names,
        vec![
            "segment_<id>_1.mp4",
            "segment_<id>_2.mp4",
            "segment_<id>_3.mp4",
        ]
    );
    assert_eq!(entries[0].1, "libx264 aac\ncut 0.000..60.000 1280x720\n");
    assert_eq!(entries[2].1, "libx264 aac\ncut 120.000..150.000 1280x720\n");
}

#[tokio::test]
async fn test_process_video_requires_file() {
    let app = TestApp::new(FakeEngine::new(60.0));

    let response = app
        .send(MultipartBody::new().text("note", "x").post("/process-video"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "error": "No file provided" })
    );
}

#[tokio::test]
async fn test_single_file_delivery_and_download() {
    let app = TestApp::new(FakeEngine::new(45.0));

    let request = captioned_upload("one").text("delivery", "file").post("/upload_video");
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "video/mp4"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let filename = disposition
        .trim_start_matches("attachment; filename=\"")
        .trim_end_matches('"')
        .to_string();
    assert_eq!(without_request_id(&filename), "output_segment_one_<id>_part1.mp4");
    let body = body_bytes(response).await;

    let download = app
        .send(
            Request::get(format!("/output/{}", filename))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(body_bytes(download).await, body);
}

#[tokio::test]
async fn test_single_file_rejects_multi_segment_plan() {
    let app = TestApp::new(FakeEngine::new(120.0));

    let request = captioned_upload("many")
        .text("output_duration", "60")
        .text("delivery", "file")
        .post("/upload_video");
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.engine.encoded().is_empty());
}

#[tokio::test]
async fn test_download_missing_output() {
    let app = TestApp::new(FakeEngine::new(60.0));

    let response = app
        .send(
            Request::get("/output/segment_missing_1.mp4")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_outputs_removed_when_not_retained() {
    let app = TestApp::with_config(FakeEngine::new(90.0), |config| {
        config.storage.retain_outputs = false;
    });

    let request = captioned_upload("gone")
        .text("output_duration", "30")
        .post("/upload_video");
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(zip_entries(&body_bytes(response).await).len(), 3);
    assert!(app.output_files().is_empty());
}

#[tokio::test]
async fn test_encode_failure_cleans_up() {
    let app = TestApp::new(FakeEngine::new(90.0).failing_on_encode(2));

    let request = captioned_upload("broken")
        .text("output_duration", "30")
        .post("/upload_video");
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());
    assert!(app.output_files().is_empty());
    assert!(app.upload_entries().is_empty());
    assert_eq!(app.engine.closed(), 1);

    let stats = app.state.job_stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn test_source_duration_limit() {
    let app = TestApp::with_config(FakeEngine::new(150.0), |config| {
        config.limits.max_source_duration_secs = Some(100.0);
    });

    let response = app
        .send(captioned_upload("long").post("/upload_video"))
        .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.engine.encoded().is_empty());
}

#[tokio::test]
async fn test_portrait_source_band_geometry() {
    let app = TestApp::new(FakeEngine::new(30.0).with_size(FrameSize::new(720, 1280)));

    let response = app
        .send(captioned_upload("tall").post("/upload_video"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let entries = zip_entries(&body_bytes(response).await);
    assert_eq!(entries.len(), 1);
    // Bands follow the original frame: full width, 15% of original height
    assert!(entries[0].1.contains("text Top 720x192 \"Part 1\""));
    assert!(entries[0].1.contains("text Bottom 720x192 \"tall\""));
    assert!(entries[0].1.contains("cut 0.000..30.000 720x1280"));
}

#[tokio::test]
async fn test_captioned_segments_keep_source_frame_rate() {
    let engine = FakeEngine::new(30.0).with_frame_rate(FrameRate::new(60, 1).unwrap());
    let app = TestApp::new(engine);

    let response = app
        .send(captioned_upload("smooth").post("/upload_video"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let entries = zip_entries(&body_bytes(response).await);
    assert!(entries[0].1.contains("composite 1920x1296 30.000s 60/1fps"));
}

#[tokio::test]
async fn test_job_stats_endpoint() {
    let app = TestApp::new(FakeEngine::new(60.0));

    let response = app
        .send(
            captioned_upload("count")
                .text("output_duration", "20")
                .post("/upload_video"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let stats = app
        .send(Request::get("/debug/jobs").body(Body::empty()).unwrap())
        .await;
    let stats = body_json(stats).await;
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["segments_produced"], 3);
    assert_eq!(stats["active"], 0);
}

#[tokio::test]
async fn test_upload_size_limit() {
    let app = TestApp::with_config(FakeEngine::new(60.0), |config| {
        config.limits.max_upload_size_mb = 1;
    });

    let big = vec![0u8; 2 * 1024 * 1024];
    let request = MultipartBody::new()
        .file("video", "clip.mp4", &big)
        .text("text_two", "big")
        .post("/upload_video");
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.output_files().is_empty());
    assert!(app.upload_entries().is_empty());
}
