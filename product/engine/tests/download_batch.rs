mod common;

use common::image_server::{self, Route};
use photograb_engine::download::{download_images, Destination, DownloadOptions, SavedLocation};
use photograb_engine::fetch::build_agent;

fn options(max_count: Option<usize>) -> DownloadOptions {
    DownloadOptions {
        min_bytes: 5_000,
        max_count,
    }
}

type Events = Vec<(String, String, serde_json::Value)>;

fn recorder(events: &mut Events) -> impl FnMut(&str, &str, serde_json::Value) -> photograb_engine::Result<()> + '_ {
    move |level, event, data| {
        events.push((level.to_string(), event.to_string(), data));
        Ok(())
    }
}

#[test]
fn size_floor_is_inclusive_at_5000_bytes() {
    let base = image_server::start(vec![
        ("/small.jpg", Route::image("image/jpeg", image_server::body(4_999, 1))),
        ("/exact.jpg", Route::image("image/jpeg", image_server::body(5_000, 2))),
    ]);
    let dir = tempfile::tempdir().expect("tempdir");
    let agent = build_agent("test-agent", 5);
    let mut events = Events::new();

    let saved = download_images(
        &agent,
        &[format!("{base}/small.jpg"), format!("{base}/exact.jpg")],
        Destination::Directory(dir.path()),
        options(None),
        recorder(&mut events),
    )
    .expect("download");

    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].filename(), "002_exact.jpg");
    assert_eq!(saved[0].record.bytes, 5_000);
    assert_eq!(
        std::fs::metadata(dir.path().join("002_exact.jpg")).expect("meta").len(),
        5_000
    );
    assert!(!dir.path().join("001_small.jpg").exists());

    let skipped: Vec<&serde_json::Value> = events
        .iter()
        .filter(|(_, event, _)| event == "image_skipped")
        .map(|(_, _, data)| data)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["reason"], "too_small");
}

#[test]
fn identical_bodies_are_saved_once() {
    let same = image_server::body(8_000, 7);
    let base = image_server::start(vec![
        ("/a.jpg", Route::image("image/jpeg", same.clone())),
        ("/b.jpg", Route::image("image/jpeg", same)),
    ]);
    let dir = tempfile::tempdir().expect("tempdir");
    let agent = build_agent("test-agent", 5);

    let saved = download_images(
        &agent,
        &[format!("{base}/a.jpg"), format!("{base}/b.jpg")],
        Destination::Directory(dir.path()),
        options(None),
        |_, _, _| Ok(()),
    )
    .expect("download");

    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].filename(), "001_a.jpg");
    assert!(!dir.path().join("002_b.jpg").exists());
}

#[test]
fn max_count_stops_after_saved_files() {
    let routes: Vec<(String, Route)> = (0..5)
        .map(|i| {
            (
                format!("/p{i}.png"),
                Route::image("image/png", image_server::body(6_000, i as u8)),
            )
        })
        .collect();
    let base = image_server::start(routes.iter().map(|(p, r)| (p.as_str(), r.clone())).collect());
    let urls: Vec<String> = (0..5).map(|i| format!("{base}/p{i}.png")).collect();
    let dir = tempfile::tempdir().expect("tempdir");
    let agent = build_agent("test-agent", 5);

    let saved = download_images(
        &agent,
        &urls,
        Destination::Directory(dir.path()),
        options(Some(2)),
        |_, _, _| Ok(()),
    )
    .expect("download");

    assert_eq!(saved.len(), 2);
    let names: Vec<&str> = saved.iter().map(|s| s.filename()).collect();
    assert_eq!(names, vec!["001_p0.png", "002_p1.png"]);
    let on_disk = std::fs::read_dir(dir.path()).expect("read_dir").count();
    assert_eq!(on_disk, 2);
}

#[test]
fn failures_and_non_images_are_skipped_without_aborting() {
    let base = image_server::start(vec![
        ("/page.jpg", Route::html("<html></html>")),
        ("/gone.jpg", Route::status(404)),
        ("/api/raw", Route::untyped(image_server::body(6_000, 3))),
        ("/raw.webp", Route::untyped(image_server::body(6_000, 4))),
        ("/api/photo?id=9", Route::image("image/png", image_server::body(6_000, 5))),
    ]);
    let dir = tempfile::tempdir().expect("tempdir");
    let agent = build_agent("test-agent", 5);
    let mut events = Events::new();

    let saved = download_images(
        &agent,
        &[
            format!("{base}/page.jpg"),
            format!("{base}/gone.jpg"),
            format!("{base}/api/raw"),
            format!("{base}/raw.webp"),
            format!("{base}/api/photo?id=9"),
        ],
        Destination::Directory(dir.path()),
        options(None),
        recorder(&mut events),
    )
    .expect("download");

    let names: Vec<&str> = saved.iter().map(|s| s.filename()).collect();
    assert_eq!(names, vec!["004_raw.webp", "image_005.png"]);

    let reasons: Vec<String> = events
        .iter()
        .filter(|(_, event, _)| event == "image_skipped")
        .map(|(_, _, data)| data["reason"].as_str().unwrap_or("").to_string())
        .collect();
    assert_eq!(reasons, vec!["not_image", "http_status", "unknown_type"]);

    let leftovers: Vec<String> = std::fs::read_dir(dir.path())
        .expect("read_dir")
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn existing_names_are_not_overwritten() {
    let base = image_server::start(vec![(
        "/bike.jpg",
        Route::image("image/jpeg", image_server::body(6_000, 9)),
    )]);
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("001_bike.jpg"), b"older").expect("seed");
    let agent = build_agent("test-agent", 5);

    let saved = download_images(
        &agent,
        &[format!("{base}/bike.jpg")],
        Destination::Directory(dir.path()),
        options(None),
        |_, _, _| Ok(()),
    )
    .expect("download");

    assert_eq!(saved[0].filename(), "001_bike_1.jpg");
    assert_eq!(
        std::fs::read(dir.path().join("001_bike.jpg")).expect("old"),
        b"older"
    );
}

#[test]
fn memory_destination_keeps_bytes() {
    let body = image_server::body(7_000, 11);
    let base = image_server::start(vec![("/m.gif", Route::image("image/gif", body.clone()))]);
    let agent = build_agent("test-agent", 5);

    let saved = download_images(
        &agent,
        &[format!("{base}/m.gif")],
        Destination::Memory,
        options(None),
        |_, _, _| Ok(()),
    )
    .expect("download");

    assert_eq!(saved.len(), 1);
    assert!(saved[0].path().is_none());
    match &saved[0].location {
        SavedLocation::Memory(data) => assert_eq!(data, &body),
        SavedLocation::File(_) => panic!("expected in-memory image"),
    }
    assert_eq!(saved[0].record.sha256.len(), 64);
}
