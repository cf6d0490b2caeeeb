//! Folder layout for browsing photos and placing exported crops.
//!
//! Exports of `<folder>/photo.jpg` go to `<folder>/<export_dir>/<new_dir>/`
//! as `photo<suffix>.jpg`, `photo<suffix>_2.jpg`, ... Names are kept unique
//! across the whole export folder tree so crops already sorted into other
//! subfolders are not shadowed.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MAX_EXPORT_INDEX: u32 = 10_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportLayout {
    pub export_dir: String,
    pub new_dir: String,
    pub suffix: String,
}

impl Default for ExportLayout {
    fn default() -> Self {
        Self {
            export_dir: "iNat".to_string(),
            new_dir: "iNat_new".to_string(),
            suffix: "_iNat".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportFolders {
    pub export_dir: PathBuf,
    pub new_dir: PathBuf,
}

impl ExportLayout {
    /// Export folders next to `image`, whether or not they exist yet.
    pub fn folders_for(&self, image: &Path) -> ExportFolders {
        let parent = image.parent().unwrap_or_else(|| Path::new("."));
        let export_dir = parent.join(&self.export_dir);
        let new_dir = export_dir.join(&self.new_dir);
        ExportFolders {
            export_dir,
            new_dir,
        }
    }

    pub fn create_folders(&self, image: &Path) -> io::Result<ExportFolders> {
        let folders = self.folders_for(image);
        fs::create_dir_all(&folders.new_dir)?;
        Ok(folders)
    }

    /// First `<stem><suffix>[_N].jpg` not yet used anywhere below `export_dir`.
    pub fn free_export_name(&self, export_dir: &Path, original: &str) -> io::Result<Option<String>> {
        let taken: HashSet<String> = collect_file_names(export_dir)?
            .into_iter()
            .map(|name| name.to_lowercase())
            .collect();
        let stem = self.clean_stem(original);
        let name = (1..MAX_EXPORT_INDEX)
            .map(|i| self.export_name(&stem, i))
            .find(|name| !taken.contains(&name.to_lowercase()));
        Ok(name)
    }

    /// Previous exports of `image`, from both export folders.
    pub fn related_images(&self, image: &Path) -> Vec<PathBuf> {
        let Some(original) = image.file_name().and_then(|n| n.to_str()) else {
            return Vec::new();
        };
        let stem = self.clean_stem(original);
        let folders = self.folders_for(image);
        let mut related = Vec::new();
        for dir in [&folders.export_dir, &folders.new_dir] {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => {
                    log::warn!("cannot list {}: {err}", dir.display());
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let is_match = path.is_file()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|name| self.is_export_of(&stem, name));
                if is_match {
                    related.push(path);
                }
            }
        }
        related.sort();
        related
    }

    fn export_name(&self, stem: &str, index: u32) -> String {
        if index == 1 {
            format!("{stem}{}.jpg", self.suffix)
        } else {
            format!("{stem}{}_{index}.jpg", self.suffix)
        }
    }

    /// Matches `<stem><suffix>.jpg` and `<stem><suffix>_<digits>.jpg`, ignoring case.
    fn is_export_of(&self, stem: &str, name: &str) -> bool {
        let name = name.to_lowercase();
        let prefix = format!("{stem}{}", self.suffix).to_lowercase();
        let Some(rest) = name.strip_prefix(&prefix) else {
            return false;
        };
        let Some(rest) = rest.strip_suffix(".jpg") else {
            return false;
        };
        match rest.strip_prefix('_') {
            None => rest.is_empty(),
            Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        }
    }

    fn clean_stem(&self, file_name: &str) -> String {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        stem.replace(&format!("{}_backup", self.suffix), "")
    }
}

/// JPEG files directly inside `dir`, sorted by name.
pub fn list_jpeg_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_jpeg(path))
        .collect();
    files.sort_by_key(|path| path.file_name().map(|n| n.to_string_lossy().to_lowercase()));
    Ok(files)
}

pub fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

fn collect_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(names),
        Err(err) => return Err(err),
    };
    for entry in entries {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
        if entry.file_type()?.is_dir() {
            names.extend(collect_file_names(&entry.path())?);
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn lists_only_jpegs_sorted() {
        let dir = tempdir().unwrap();
        for name in ["b.JPG", "a.jpeg", "c.png", "notes.txt"] {
            touch(&dir.path().join(name));
        }
        fs::create_dir(dir.path().join("sub.jpg")).unwrap();
        let files = list_jpeg_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.jpeg", "b.JPG"]);
    }

    #[test]
    fn export_folders_are_nested() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("IMG_1.jpg");
        let folders = ExportLayout::default().create_folders(&image).unwrap();
        assert_eq!(folders.export_dir, dir.path().join("iNat"));
        assert_eq!(folders.new_dir, dir.path().join("iNat").join("iNat_new"));
        assert!(folders.new_dir.is_dir());
    }

    #[test]
    fn free_name_skips_taken_names_in_whole_tree() {
        let dir = tempdir().unwrap();
        let layout = ExportLayout::default();
        let export = dir.path().join("iNat");
        assert_eq!(
            layout.free_export_name(&export, "IMG_1.jpg").unwrap().as_deref(),
            Some("IMG_1_iNat.jpg")
        );
        touch(&export.join("img_1_inat.JPG"));
        touch(&export.join("sorted").join("IMG_1_iNat_2.jpg"));
        assert_eq!(
            layout.free_export_name(&export, "IMG_1.jpg").unwrap().as_deref(),
            Some("IMG_1_iNat_3.jpg")
        );
    }

    #[test]
    fn backup_suffix_is_removed() {
        let dir = tempdir().unwrap();
        let layout = ExportLayout::default();
        assert_eq!(
            layout
                .free_export_name(dir.path(), "IMG_7_iNat_backup.jpeg")
                .unwrap()
                .as_deref(),
            Some("IMG_7_iNat.jpg")
        );
    }

    #[test]
    fn finds_related_exports_in_both_folders() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("IMG_1.jpg");
        touch(&image);
        let export = dir.path().join("iNat");
        touch(&export.join("IMG_1_iNat.jpg"));
        touch(&export.join("iNat_new").join("IMG_1_iNat_4.JPG"));
        touch(&export.join("IMG_10_iNat.jpg"));
        touch(&export.join("IMG_1_iNat_x.jpg"));
        let related = ExportLayout::default().related_images(&image);
        assert_eq!(
            related,
            vec![
                export.join("IMG_1_iNat.jpg"),
                export.join("iNat_new").join("IMG_1_iNat_4.JPG"),
            ]
        );
    }

    #[test]
    fn no_export_folder_means_no_related_images() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("IMG_1.jpg");
        assert!(ExportLayout::default().related_images(&image).is_empty());
    }
}
