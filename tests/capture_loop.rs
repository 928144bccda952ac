use std::sync::Arc;

use anyhow::Result;
use image::{Rgb, RgbImage};

use capture_relay::classify::{open_classifier, ClassifierSettings};
use capture_relay::detect::{open_detector, DetectorSettings};
use capture_relay::ingest::{open_source, SourceSettings};
use capture_relay::persist::SnapshotSink;
use capture_relay::pipeline::{CaptureLoop, LoopSettings, Sinks, StopReason};
use capture_relay::publish::DryRunPublisher;
use capture_relay::schedule::ManualClock;

fn jpegs_in(dir: &std::path::Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".jpg"))
        .collect();
    names.sort();
    Ok(names)
}

fn stub_classifier() -> Result<Box<dyn capture_relay::Classifier>> {
    open_classifier(&ClassifierSettings {
        network: "stub".to_string(),
        ..Default::default()
    })
}

#[test]
fn synthetic_stream_runs_to_end_of_stream() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let captured = dir.path().join("captured");
    let still = dir.path().join("still");
    let preview = dir.path().join("preview");

    let source = open_source(&SourceSettings {
        input_uri: "stub://bench?frames=8".to_string(),
        width: 32,
        height: 24,
        ..Default::default()
    })?;
    let detector = open_detector(&DetectorSettings {
        backend: "cpu".to_string(),
        ..Default::default()
    })?;
    let sinks = Sinks {
        captured: SnapshotSink::open(&captured)?,
        still: SnapshotSink::open(&still)?,
        preview: Some(SnapshotSink::open(&preview)?),
    };

    let mut capture_loop = CaptureLoop::new(
        source,
        stub_classifier()?,
        detector,
        DryRunPublisher::new(),
        sinks,
        Arc::new(ManualClock::new(1_000_000)),
        LoopSettings::new(captured.display().to_string()),
    )
    .with_console(Box::new(std::io::sink()));

    let report = capture_loop.run()?;
    assert_eq!(report.stop_reason, StopReason::EndOfStream);
    assert_eq!(report.ticks, 8);
    assert_eq!(report.published + report.unrouted, 8);
    assert_eq!(capture_loop.publisher().published(), report.published);

    let names = jpegs_in(&captured)?;
    assert_eq!(names.len(), 8);
    assert_eq!(names[0], format!("{}.jpg", 1_000_000 + 401));
    // Captures at 401ms steps: the 6th one is the first past 2400ms.
    assert_eq!(jpegs_in(&still)?, vec![format!("{}.jpg", 1_000_000 + 6 * 401)]);
    assert_eq!(jpegs_in(&preview)?, vec!["latest.jpg".to_string()]);
    Ok(())
}

#[test]
fn image_directory_is_replayed_in_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("input");
    std::fs::create_dir_all(&input)?;
    for (i, shade) in [30u8, 120, 220].iter().enumerate() {
        let img = RgbImage::from_pixel(20, 10, Rgb([*shade, *shade, *shade]));
        img.save(input.join(format!("frame_{}.png", i)))?;
    }

    let source = open_source(&SourceSettings {
        input_uri: format!("file://{}", input.display()),
        width: 40,
        height: 20,
        ..Default::default()
    })?;
    let captured = dir.path().join("captured");
    let sinks = Sinks {
        captured: SnapshotSink::open(&captured)?,
        still: SnapshotSink::open(dir.path().join("still"))?,
        preview: None,
    };
    let detector = open_detector(&DetectorSettings {
        backend: "stub".to_string(),
        ..Default::default()
    })?;

    let mut capture_loop = CaptureLoop::new(
        source,
        stub_classifier()?,
        detector,
        DryRunPublisher::new(),
        sinks,
        Arc::new(ManualClock::new(0)),
        LoopSettings::new(captured.display().to_string()),
    )
    .with_console(Box::new(std::io::sink()));

    let report = capture_loop.run()?;
    assert_eq!(report.stop_reason, StopReason::EndOfStream);
    assert_eq!(report.ticks, 3);
    assert_eq!(report.snapshots, 3);

    let first = image::open(captured.join("401.jpg"))?;
    assert_eq!((first.width(), first.height()), (40, 20));
    Ok(())
}
