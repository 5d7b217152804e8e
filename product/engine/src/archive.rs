use crate::download::{SavedImage, SavedLocation};
use crate::normalize::IMAGE_EXTENSIONS;
use crate::Result;
use std::io::{Cursor, Write};
use std::path::Path;

pub fn build_zip(mut members: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>> {
    members.sort_by(|a, b| a.0.cmp(&b.0));

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (name, data) in members {
        zip.start_file(name, options)?;
        zip.write_all(&data)?;
    }

    Ok(zip.finish()?.into_inner())
}

pub fn zip_saved_images(images: &[SavedImage]) -> Result<Vec<u8>> {
    let mut members = Vec::with_capacity(images.len());
    for image in images {
        let data = match &image.location {
            SavedLocation::Memory(data) => data.clone(),
            SavedLocation::File(path) => std::fs::read(path)?,
        };
        members.push((image.filename().to_string(), data));
    }
    build_zip(members)
}

pub fn zip_directory_files(dir: &Path, names: &[String]) -> Result<Vec<u8>> {
    let mut members = Vec::new();
    for name in names {
        if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name.as_str()) {
            continue;
        }
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        members.push((name.clone(), std::fs::read(&path)?));
    }
    build_zip(members)
}

pub fn list_image_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if is_image_file_name(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

pub(crate) fn is_image_file_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn member_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("archive");
        (0..archive.len())
            .map(|i| archive.by_index(i).expect("member").name().to_string())
            .collect()
    }

    #[test]
    fn members_are_sorted_and_deflated() {
        let bytes = build_zip(vec![
            ("b.jpg".to_string(), vec![1_u8; 100]),
            ("a.jpg".to_string(), vec![2_u8; 100]),
        ])
        .expect("zip");

        assert_eq!(member_names(&bytes), vec!["a.jpg", "b.jpg"]);
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("archive");
        let mut first = archive.by_name("a.jpg").expect("a");
        assert_eq!(first.compression(), zip::CompressionMethod::Deflated);
        let mut data = Vec::new();
        first.read_to_end(&mut data).expect("read");
        assert_eq!(data, vec![2_u8; 100]);
    }

    #[test]
    fn directory_zip_skips_missing_and_nested_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("001_a.jpg"), b"a").expect("write");
        let bytes = zip_directory_files(
            dir.path(),
            &[
                "001_a.jpg".to_string(),
                "gone.jpg".to_string(),
                "../001_a.jpg".to_string(),
            ],
        )
        .expect("zip");
        assert_eq!(member_names(&bytes), vec!["001_a.jpg"]);
    }

    #[test]
    fn image_listing_ignores_other_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("b.PNG"), b"b").expect("write");
        std::fs::write(dir.path().join("a.jpg"), b"a").expect("write");
        std::fs::write(dir.path().join("notes.txt"), b"n").expect("write");
        std::fs::write(dir.path().join("c.jpg.part"), b"c").expect("write");
        std::fs::create_dir(dir.path().join("sub.jpg")).expect("dir");
        assert_eq!(list_image_files(dir.path()).expect("list"), vec!["a.jpg", "b.PNG"]);
    }
}
