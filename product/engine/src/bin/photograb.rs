use std::path::PathBuf;

use photograb_engine::archive::zip_saved_images;
use photograb_engine::config::{load_config, load_config_from};
use photograb_engine::download::{download_images, write_manifest, Destination, DownloadOptions};
use photograb_engine::fetch::image_agent;
use photograb_engine::logging::EventLog;
use photograb_engine::paths::AppPaths;
use photograb_engine::service::{parse_selection, GrabService};
use photograb_engine::EngineError;

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let mut listing_url: Option<String> = None;
    let mut out_dir: Option<PathBuf> = None;
    let mut max_count: Option<usize> = None;
    let mut selection: Vec<String> = Vec::new();
    let mut zip_path: Option<PathBuf> = None;
    let mut list_only = false;
    let mut base_dir: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--out" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--out requires a value".to_string())?;
                out_dir = Some(PathBuf::from(v));
            }
            "--max" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--max requires a value".to_string())?;
                let n = v
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| format!("--max expects a number, got {v}"))?;
                // Zero or negative disables the cap.
                max_count = usize::try_from(n).ok().filter(|n| *n > 0);
            }
            "--select" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--select requires a value".to_string())?;
                selection.extend(
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty()),
                );
            }
            "--zip" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--zip requires a value".to_string())?;
                zip_path = Some(PathBuf::from(v));
            }
            "--list" => list_only = true,
            "--base-dir" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--base-dir requires a value".to_string())?;
                base_dir = Some(PathBuf::from(v));
            }
            "--config" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config_path = Some(PathBuf::from(v));
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown arg: {other} (try --help)"))
            }
            other => {
                if listing_url.is_some() {
                    return Err(format!("unexpected extra argument: {other}"));
                }
                listing_url = Some(other.to_string());
            }
        }
        i += 1;
    }

    let listing_url = listing_url.ok_or_else(|| "missing listing URL (try --help)".to_string())?;

    let paths = match base_dir {
        Some(dir) => AppPaths::new(dir),
        None => AppPaths::from_env().map_err(|e| e.to_string())?,
    };
    let config = match &config_path {
        Some(path) => load_config_from(path),
        None => load_config(&paths),
    }
    .map_err(|e| e.to_string())?;

    let event_log = EventLog::for_paths(&paths);
    let mut log_line = |level: &str, event: &str, data: serde_json::Value| {
        match event {
            "image_saved" => println!("Saved: {}", data["filename"].as_str().unwrap_or("")),
            "image_skipped" => println!(
                "Skip ({}): {}",
                data["reason"].as_str().unwrap_or("unknown"),
                data["url"].as_str().unwrap_or("")
            ),
            _ => {}
        }
        event_log.log(level, event, data)
    };

    let service = GrabService::new(config.clone(), paths.clone());
    let grabbed = match service.grab(&listing_url, &mut log_line) {
        Ok(v) => v,
        Err(EngineError::NoPhotosFound) => {
            println!("No images found.");
            return Ok(());
        }
        Err(e) => return Err(e.to_string()),
    };
    println!("Found {} image candidates.", grabbed.images.len());

    if list_only {
        for image in &grabbed.images {
            println!("{:>3}  {}", image.index, image.url);
        }
        return Ok(());
    }

    let candidates: Vec<String> = grabbed.images.iter().map(|c| c.url.clone()).collect();
    let urls = if selection.is_empty() {
        candidates
    } else {
        parse_selection(&selection, &candidates).map_err(|e| e.to_string())?
    };

    let out_dir = out_dir.unwrap_or_else(|| paths.listing_dir(&grabbed.slug));
    let options = DownloadOptions::from_config(&config, max_count);
    let saved = download_images(
        &image_agent(&config),
        &urls,
        Destination::Directory(&out_dir),
        options,
        &mut log_line,
    )
    .map_err(|e| e.to_string())?;

    if saved.is_empty() {
        return Err(EngineError::NothingDownloaded.to_string());
    }

    write_manifest(&out_dir.join("manifest.csv"), &saved).map_err(|e| e.to_string())?;
    println!(
        "Downloaded {} images to {}",
        saved.len(),
        out_dir.to_string_lossy()
    );

    if let Some(zip_path) = zip_path {
        let bytes = zip_saved_images(&saved).map_err(|e| e.to_string())?;
        if let Some(parent) = zip_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&zip_path, bytes).map_err(|e| e.to_string())?;
        println!("Zip: {}", zip_path.to_string_lossy());
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"photograb

Downloads the photos of a classifieds listing page.

Usage:
  photograb <listing-url>
  photograb <listing-url> --list
  photograb <listing-url> --select 0,2,5 --zip photos.zip

Options:
  --out <dir>         Save images here (default: <base-dir>/downloads/<slug>)
  --max <n>           Stop after n images have been saved
  --select <i,j,...>  Only download these candidate indices (see --list)
  --zip <file>        Also bundle the saved images into a zip file
  --list              Print the ranked candidates and exit
  --base-dir <path>   Override base dir (default: $PHOTOGRAB_BASE_DIR or the current directory)
  --config <file>     Read settings from this JSON file instead of <base-dir>/config/photograb.json
"#
    );
}
