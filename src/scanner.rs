//! Movie scanner: walks configured filesystem roots, classifies files by
//! extension, composes items with their resources, artwork and subtitles,
//! optionally materializes per-folder collection containers, and commits
//! everything to the `Store`.
//!
//! Extension classification and the sorted-name, prefix-scan matching of
//! artwork/subtitles to a video's filename stem follow the usual
//! movie-library-scanner idiom; collection/title/year logic builds on
//! that.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{info, warn};

use crate::config::ContentRoot;
use crate::error::Result;
use crate::store::{Artwork, ArtworkKind, KeyTag, LibraryKey, MediaObject, Resource, ResourceRef, Store};

const MOVIES_CONTAINER_TITLE: &str = "Movies";
const MOVIE_UPNP_CLASS: &str = "object.item.videoItem.movie";
const CONTAINER_UPNP_CLASS: &str = "object.container";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Video,
    Image,
    Text,
}

fn classify(extension: &str) -> Option<(Category, &'static str)> {
    match extension.to_ascii_lowercase().as_str() {
        "mkv" => Some((Category::Video, "video/x-matroska")),
        "mp4" => Some((Category::Video, "video/mp4")),
        "avi" => Some((Category::Video, "video/x-msvideo")),
        "mpg" => Some((Category::Video, "video/mpeg")),
        "jpg" => Some((Category::Image, "image/jpeg")),
        "srt" => Some((Category::Text, "text/srt")),
        _ => None,
    }
}

/// Walks one configured content root and populates the store under the
/// shared `Movies` top-level container.
pub struct Scanner {
    store: Arc<Store>,
    next_object_id: AtomicI64,
    next_resource_id: AtomicI64,
    separator_re: Regex,
    year_re: Regex,
}

impl Scanner {
    pub async fn new(store: Arc<Store>) -> Result<Scanner> {
        let next_object_id = store.next_id(KeyTag::Object).await?;
        let next_resource_id = store.next_id(KeyTag::Resource).await?;
        Ok(Scanner {
            store,
            next_object_id: AtomicI64::new(next_object_id),
            next_resource_id: AtomicI64::new(next_resource_id),
            separator_re: Regex::new(r"[._]+").expect("static regex"),
            year_re: Regex::new(r"\(?([12]\d{3})\)?").expect("static regex"),
        })
    }

    fn alloc_object_id(&self) -> i64 {
        self.next_object_id.fetch_add(1, Ordering::SeqCst)
    }

    fn alloc_resource_id(&self) -> i64 {
        self.next_resource_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Ensures the `Movies` container exists directly under root,
    /// reusing it if a scan already created it.
    pub async fn ensure_movies_container(&self) -> Result<i64> {
        let children = self.store.list_children(0).await?;
        for child in &children {
            if child.is_container() && child.dc_title() == MOVIES_CONTAINER_TITLE {
                return Ok(child.id());
            }
        }
        let id = self.alloc_object_id();
        let container = MediaObject::Container {
            id,
            parent_id: 0,
            dc_title: MOVIES_CONTAINER_TITLE.to_string(),
            upnp_class: CONTAINER_UPNP_CLASS.to_string(),
            artwork: vec![],
            children: vec![],
        };
        self.store.put_batch(0, vec![container], vec![]).await?;
        Ok(id)
    }

    /// Scans one configured root, attaching its tree under `Movies`.
    pub async fn scan_root(&self, root: &ContentRoot) -> Result<()> {
        let movies_id = self.ensure_movies_container().await?;
        info!(path = %root.path.display(), "scanning content root");
        self.scan_directory(&root.path, movies_id, root, true).await
    }

    fn scan_directory<'a>(
        &'a self,
        dir: &'a Path,
        parent_id: i64,
        opts: &'a ContentRoot,
        is_root_invocation: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + 'a>> {
        Box::pin(async move {
            let mut read_dir = match tokio::fs::read_dir(dir).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "cannot read directory, skipping");
                    return Ok(());
                }
            };

            let mut videos: Vec<PathBuf> = Vec::new();
            let mut images: BTreeMap<String, PathBuf> = BTreeMap::new();
            let mut texts: BTreeMap<String, PathBuf> = BTreeMap::new();
            let mut subdirs: Vec<PathBuf> = Vec::new();

            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    subdirs.push(path);
                    continue;
                }
                let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
                    continue;
                };
                let Some((category, _mime)) = classify(extension) else {
                    continue;
                };
                let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
                match category {
                    Category::Video => videos.push(path),
                    Category::Image => {
                        images.insert(file_name, path.clone());
                    }
                    Category::Text => {
                        texts.insert(file_name, path.clone());
                    }
                }
            }
            videos.sort();
            subdirs.sort();

            let folder_artwork = folder_artwork_candidate(&images);

            let use_collections = opts.use_collections && !is_root_invocation;
            let wants_collection = use_collections
                && (videos.len() > 1
                    || (videos.len() == 1 && folder_artwork.is_some() && !subdirs.is_empty())
                    || (videos.is_empty() && folder_artwork.is_some() && !subdirs.is_empty()));

            let effective_parent_id = if wants_collection {
                let stem = dir.file_name().and_then(|n| n.to_str()).unwrap_or("Untitled").to_string();
                let container_id = self.alloc_object_id();
                let container = MediaObject::Container {
                    id: container_id,
                    parent_id,
                    dc_title: stem,
                    upnp_class: CONTAINER_UPNP_CLASS.to_string(),
                    artwork: vec![],
                    children: vec![],
                };
                self.store.put_batch(parent_id, vec![container], vec![]).await?;
                container_id
            } else {
                parent_id
            };

            if !videos.is_empty() {
                self.commit_videos(
                    &videos,
                    &images,
                    &texts,
                    folder_artwork.as_ref(),
                    effective_parent_id,
                    opts,
                    is_root_invocation,
                )
                .await?;
            }

            for subdir in &subdirs {
                self.scan_directory(subdir, effective_parent_id, opts, false).await?;
            }

            Ok(())
        })
    }

    async fn commit_videos(
        &self,
        videos: &[PathBuf],
        images: &BTreeMap<String, PathBuf>,
        texts: &BTreeMap<String, PathBuf>,
        folder_artwork: Option<&(PathBuf, ArtworkKind)>,
        parent_id: i64,
        opts: &ContentRoot,
        is_root_invocation: bool,
    ) -> Result<()> {
        let mut objects = Vec::with_capacity(videos.len());
        let mut resources = Vec::new();

        let folder_artwork_resource = match folder_artwork {
            Some((path, kind)) => {
                let id = self.alloc_resource_id();
                resources.push((
                    id,
                    Resource { location: path.display().to_string(), mime_type: "image/jpeg".to_string() },
                ));
                Some((LibraryKey::resource(id), *kind))
            }
            None => None,
        };

        // Folder-name titling never applies to the configured scan root
        // itself (only to an actual per-movie subdirectory) — otherwise a
        // single video sitting directly under the root would be titled
        // after the root's own directory name. See DESIGN.md.
        let use_folder_name = opts.use_folder_names && videos.len() == 1 && !is_root_invocation;
        let folder_title = if use_folder_name {
            videos[0].parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()).map(str::to_string)
        } else {
            None
        };

        for video in videos {
            let stem = video.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            let extension = video.extension().and_then(|e| e.to_str()).unwrap_or_default();
            let Some((_, mime)) = classify(extension) else { continue };

            let resource_id = self.alloc_resource_id();
            resources.push((
                resource_id,
                Resource { location: video.display().to_string(), mime_type: mime.to_string() },
            ));
            let mut item_resources =
                vec![ResourceRef { reference: LibraryKey::resource(resource_id), protocol_info: format!("http-get:*:{mime}:*") }];

            for (_name, path) in prefix_matches(texts, &stem) {
                let sub_id = self.alloc_resource_id();
                resources.push((sub_id, Resource { location: path.display().to_string(), mime_type: "text/srt".to_string() }));
                item_resources.push(ResourceRef {
                    reference: LibraryKey::resource(sub_id),
                    protocol_info: "http-get:*:text/srt:*".to_string(),
                });
            }

            let mut artwork = Vec::new();
            for (name, path) in prefix_matches(images, &stem) {
                let lower = name.to_ascii_lowercase();
                let kind = if lower.contains("poster") {
                    ArtworkKind::Poster
                } else if lower.contains("thumb") {
                    ArtworkKind::Thumbnail
                } else {
                    continue;
                };
                let art_id = self.alloc_resource_id();
                resources.push((art_id, Resource { location: path.display().to_string(), mime_type: "image/jpeg".to_string() }));
                artwork.push(Artwork { reference: LibraryKey::resource(art_id), kind });
            }
            if artwork.is_empty() {
                if let Some((reference, kind)) = &folder_artwork_resource {
                    artwork.push(Artwork { reference: *reference, kind: *kind });
                }
            }

            let raw_title = folder_title.clone().unwrap_or(stem);
            let (title, dc_date) = normalize_title(&raw_title, &self.separator_re, &self.year_re);

            let item_id = self.alloc_object_id();
            objects.push(MediaObject::Item {
                id: item_id,
                parent_id,
                dc_title: title,
                upnp_class: MOVIE_UPNP_CLASS.to_string(),
                artwork,
                resources: item_resources,
                dc_date,
            });
        }

        self.store.put_batch(parent_id, objects, resources).await
    }
}

fn folder_artwork_candidate(images: &BTreeMap<String, PathBuf>) -> Option<(PathBuf, ArtworkKind)> {
    if let Some(path) = images.get("poster.jpg") {
        return Some((path.clone(), ArtworkKind::Poster));
    }
    if let Some(path) = images.get("folder.jpg") {
        return Some((path.clone(), ArtworkKind::Thumbnail));
    }
    None
}

/// Files whose name starts with `stem`, found via a sorted-map range
/// scan — the idiomatic equivalent of the original's
/// `std::map::lower_bound` prefix scan.
fn prefix_matches<'a>(map: &'a BTreeMap<String, PathBuf>, stem: &str) -> Vec<(&'a String, &'a PathBuf)> {
    map.range(stem.to_string()..)
        .take_while(|(name, _)| name.starts_with(stem))
        .collect()
}

/// Normalizes a raw filename/folder stem into a display title and an
/// optional `dc_date` (epoch-days of January 1st of an extracted year).
fn normalize_title(raw: &str, separator_re: &Regex, year_re: &Regex) -> (String, Option<i64>) {
    let (remainder, dc_date) = match year_re.captures(raw) {
        Some(caps) => {
            let whole = caps.get(0).unwrap();
            let year: i32 = caps.get(1).unwrap().as_str().parse().unwrap_or(1970);
            let mut remainder = String::with_capacity(raw.len());
            remainder.push_str(&raw[..whole.start()]);
            remainder.push_str(&raw[whole.end()..]);
            let epoch_days = NaiveDate::from_ymd_opt(year, 1, 1)
                .map(|d| (d - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days());
            (remainder, epoch_days)
        }
        None => (raw.to_string(), None),
    };

    let spaced = separator_re.replace_all(&remainder, " ");
    let title = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    (title, dc_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use std::fs;

    fn re() -> (Regex, Regex) {
        (Regex::new(r"[._]+").unwrap(), Regex::new(r"\(?([12]\d{3})\)?").unwrap())
    }

    #[test]
    fn normalizes_dots_and_extracts_year() {
        let (sep, year) = re();
        let (title, dc_date) = normalize_title("My.Movie.(2001)", &sep, &year);
        assert_eq!(title, "My Movie");
        let expected = (NaiveDate::from_ymd_opt(2001, 1, 1).unwrap() - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days();
        assert_eq!(dc_date, Some(expected));
    }

    #[test]
    fn normalizes_underscores_without_year() {
        let (sep, year) = re();
        let (title, dc_date) = normalize_title("Some_Video_File", &sep, &year);
        assert_eq!(title, "Some Video File");
        assert_eq!(dc_date, None);
    }

    #[test]
    fn prefix_matches_finds_stem_prefixed_files() {
        let mut map = BTreeMap::new();
        map.insert("alpha.srt".to_string(), PathBuf::from("/m/alpha.srt"));
        map.insert("alpha.en.srt".to_string(), PathBuf::from("/m/alpha.en.srt"));
        map.insert("beta.srt".to_string(), PathBuf::from("/m/beta.srt"));
        let matches = prefix_matches(&map, "alpha");
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn scans_single_video_directory_into_movies_container() {
        let tmp = tempfile::tempdir().unwrap();
        let media_dir = tmp.path().join("media");
        fs::create_dir_all(&media_dir).unwrap();
        fs::write(media_dir.join("alpha.mkv"), b"fake-data").unwrap();

        let db_path = tmp.path().join("eems.redb");
        let (store, _fresh) = Store::open_or_create(&db_path).await.unwrap();
        let store = Arc::new(store);
        let scanner = Scanner::new(store.clone()).await.unwrap();
        let root = ContentRoot { path: media_dir.clone(), use_folder_names: true, use_collections: true };
        scanner.scan_root(&root).await.unwrap();

        let root_children = store.list_children(0).await.unwrap();
        assert_eq!(root_children.len(), 1);
        assert_eq!(root_children[0].dc_title(), "Movies");
        assert!(root_children[0].is_container());

        let movies_children = store.list_children(root_children[0].id()).await.unwrap();
        assert_eq!(movies_children.len(), 1);
        assert_eq!(movies_children[0].dc_title(), "alpha");
        assert_eq!(movies_children[0].upnp_class(), MOVIE_UPNP_CLASS);
    }

    #[tokio::test]
    async fn single_video_folder_with_artwork_and_subdirs_creates_collection_and_reparents() {
        let tmp = tempfile::tempdir().unwrap();
        let media_dir = tmp.path().join("media");
        let collection_dir = media_dir.join("MyCollection");
        let sub_dir = collection_dir.join("extras");
        fs::create_dir_all(&sub_dir).unwrap();
        fs::write(collection_dir.join("alpha.mkv"), b"fake-data").unwrap();
        fs::write(collection_dir.join("poster.jpg"), b"fake-jpg").unwrap();
        fs::write(sub_dir.join("beta.mkv"), b"fake-data-2").unwrap();

        let db_path = tmp.path().join("eems.redb");
        let (store, _fresh) = Store::open_or_create(&db_path).await.unwrap();
        let store = Arc::new(store);
        let scanner = Scanner::new(store.clone()).await.unwrap();
        let root = ContentRoot { path: media_dir.clone(), use_folder_names: false, use_collections: true };
        scanner.scan_root(&root).await.unwrap();

        let root_children = store.list_children(0).await.unwrap();
        let movies_id = root_children[0].id();
        let movies_children = store.list_children(movies_id).await.unwrap();
        assert_eq!(movies_children.len(), 1);
        assert_eq!(movies_children[0].dc_title(), "MyCollection");
        assert!(movies_children[0].is_container());

        let collection_children = store.list_children(movies_children[0].id()).await.unwrap();
        assert_eq!(collection_children.len(), 2);
        assert!(collection_children.iter().any(|c| c.dc_title() == "alpha"));
        assert!(collection_children.iter().any(|c| c.dc_title() == "beta"));
    }

    #[tokio::test]
    async fn scan_is_idempotent_given_a_fresh_next_id_priming() {
        let tmp = tempfile::tempdir().unwrap();
        let media_dir = tmp.path().join("media");
        fs::create_dir_all(&media_dir).unwrap();
        fs::write(media_dir.join("alpha.mkv"), b"fake-data").unwrap();

        let db_path = tmp.path().join("eems.redb");
        let (store, _fresh) = Store::open_or_create(&db_path).await.unwrap();
        let store = Arc::new(store);
        let scanner = Scanner::new(store.clone()).await.unwrap();
        let root = ContentRoot { path: media_dir.clone(), use_folder_names: true, use_collections: true };
        scanner.scan_root(&root).await.unwrap();

        let first_object_id = scanner.next_object_id.load(Ordering::SeqCst);
        let db_path2 = tmp.path().join("eems2.redb");
        let (store2, _fresh2) = Store::open_or_create(&db_path2).await.unwrap();
        let store2 = Arc::new(store2);
        let scanner2 = Scanner::new(store2.clone()).await.unwrap();
        scanner2.scan_root(&root).await.unwrap();
        let second_object_id = scanner2.next_object_id.load(Ordering::SeqCst);
        assert_eq!(first_object_id, second_object_id);
    }
}
