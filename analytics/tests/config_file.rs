use std::io::Write;
use stream_analytics::{AnalyticsConfig, AnalyticsError, Association};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
        max_concurrent_streams = 3
        stream_queue_depth = 4

        [detector]
        confidence_threshold = 0.6
        iou_threshold = 0.5
        max_detections = 20

        [max_resolution]
        width = 1280
        height = 720

        [tracking]
        max_age = 10
        min_hits = 2
        match_iou_threshold = 0.4
        association = "optimal"

        [brand]
        match_threshold = 0.7
        color_clusters = 4

        [brand.kmeans]
        attempts = 3

        [[brand.eligible]]
        brand = "acme"
        colors = [[255, 0, 0], [0, 0, 255]]
        eligible_classes = ["cup"]

        [sponsor]
        top_k = 2
        "#,
    );

    let config = AnalyticsConfig::load(file.path()).unwrap();
    assert_eq!(config.max_concurrent_streams, 3);
    assert_eq!(config.stream_queue_depth, 4);
    assert_eq!(config.detector.max_detections, 20);
    assert_eq!(config.max_resolution.width, 1280);
    assert_eq!(config.tracking.association, Association::Optimal);
    assert_eq!(config.tracking.max_age, 10);
    assert_eq!(config.tracking.history_len, 30);
    assert_eq!(config.brand.color_clusters, 4);
    assert_eq!(config.brand.kmeans.attempts, 3);
    assert_eq!(config.brand.kmeans.max_iterations, 20);
    assert_eq!(config.brand.eligible.len(), 1);
    assert_eq!(config.brand.eligible[0].colors[1], [0, 0, 255]);
    assert_eq!(config.sponsor.top_k, 2);
    assert_eq!(config.sponsor.match_threshold, 0.3);
    assert_eq!(config.sponsor.brands.len(), 10);
}

#[test]
fn test_empty_file_gives_defaults() {
    let file = write_config("");
    let config = AnalyticsConfig::load(file.path()).unwrap();
    assert_eq!(config.max_concurrent_streams, 5);
    assert_eq!(config.brand.match_threshold, 0.6);
    assert_eq!(config.brand.eligible.len(), 4);
}

#[test]
fn test_invalid_values_rejected() {
    let file = write_config("[max_resolution]\nwidth = 0\n");
    assert!(matches!(
        AnalyticsConfig::load(file.path()),
        Err(AnalyticsError::Config(_))
    ));

    let file = write_config("[tracking]\nassociation = \"hungarian\"\n");
    assert!(matches!(
        AnalyticsConfig::load(file.path()),
        Err(AnalyticsError::ConfigParse(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        AnalyticsConfig::load(dir.path().join("absent.toml")),
        Err(AnalyticsError::Io(_))
    ));
}
