//! Directory listings merged from child mounts and backend objects.

use futures::StreamExt;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, error, warn};

use crate::{
    backend::StorageBackend,
    models::{
        attributes::{ListItem, ObjectAttributes},
        entry::Entry,
        mount::Mount,
    },
    services::{
        mount_table::MountTable,
        version::{Version, guess_version},
    },
};

/// Hierarchy delimiter used for backend listings and virtual paths.
pub const DELIMITER: &str = "/";

#[derive(Clone, Debug)]
pub struct ListingOptions {
    /// File name recognised as the directory README, compared case-insensitively.
    pub readme_name: String,
    /// Leave the README out of the entries (it is still returned as candidate).
    pub skip_readme: bool,
    pub version_sort: bool,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            readme_name: "README.md".into(),
            skip_readme: false,
            version_sort: false,
        }
    }
}

/// Merged directory view.
#[derive(Clone, Debug, Default)]
pub struct Listing {
    pub entries: Vec<Entry>,
    pub readme: Option<ObjectAttributes>,
}

#[derive(Clone)]
pub struct ListingAggregator {
    mounts: Arc<MountTable>,
    backend: Arc<dyn StorageBackend>,
    options: Arc<ListingOptions>,
}

impl ListingAggregator {
    pub fn new(
        mounts: Arc<MountTable>,
        backend: Arc<dyn StorageBackend>,
        options: ListingOptions,
    ) -> Self {
        Self {
            mounts,
            backend,
            options: Arc::new(options),
        }
    }

    /// List the directory `path` (slash-terminated).
    ///
    /// Never fails: a backend error leaves whatever was gathered before it.
    pub async fn list(&self, path: &str) -> Listing {
        let mut entries: Vec<Entry> = self.mounts.children_of(path).map(Entry::directory).collect();

        let readme = match self.mounts.resolve(path) {
            Some(mount) => self.collect_backend(mount, path, &mut entries).await,
            None => None,
        };

        Listing {
            entries: merge_entries(entries, self.options.version_sort),
            readme,
        }
    }

    async fn collect_backend(
        &self,
        mount: &Mount,
        path: &str,
        entries: &mut Vec<Entry>,
    ) -> Option<ObjectAttributes> {
        let prefix = mount.backend_name(path);
        debug!(bucket = %mount.bucket, prefix = %prefix, "listing objects");

        let mut listing = match self
            .backend
            .list_objects(&mount.bucket, &prefix, DELIMITER)
            .await
        {
            Ok(listing) => listing,
            Err(err) => {
                error!(bucket = %mount.bucket, prefix = %prefix, err = %err, "failed to list objects");
                return None;
            }
        };

        let mut readme = None;
        while let Some(item) = listing.next().await {
            match item {
                Ok(ListItem::CommonPrefix(common)) => match common.strip_prefix(&prefix) {
                    Some(name) if !name.is_empty() => entries.push(Entry::directory(name)),
                    _ => warn!(prefix = %common, "unexpected common prefix"),
                },
                Ok(ListItem::Object(attrs)) => {
                    // Folder placeholder objects carry the directory name itself.
                    if attrs.name == prefix {
                        continue;
                    }
                    let Some(name) = attrs.name.strip_prefix(&prefix) else {
                        warn!(name = %attrs.name, "unexpected object");
                        continue;
                    };
                    let entry = Entry::object(name, &attrs);
                    if name.eq_ignore_ascii_case(&self.options.readme_name) {
                        readme = Some(attrs);
                        if self.options.skip_readme {
                            continue;
                        }
                    }
                    entries.push(entry);
                }
                Err(err) => {
                    error!(bucket = %mount.bucket, prefix = %prefix, err = %err, "failed to list objects");
                    break;
                }
            }
        }

        readme
    }
}

/// Stable-sort `entries` (objects before directories, then by name) and drop
/// entries whose name equals the one right before them.
///
/// A directory and an object with the same name land in different bands and
/// both survive. With `version_sort`, names sharing the text before a
/// version are then reordered highest version first.
pub fn merge_entries(mut entries: Vec<Entry>, version_sort: bool) -> Vec<Entry> {
    entries.sort_by(|a, b| {
        a.is_directory()
            .cmp(&b.is_directory())
            .then_with(|| a.name.cmp(&b.name))
    });
    entries.dedup_by(|current, previous| current.name == previous.name);
    if version_sort {
        order_versions(&mut entries);
    }
    entries
}

/// Reorder entries that share a band and the text before their version,
/// highest version first, within the slots they already hold.
///
/// Names without a version, or whose text differs, keep their name order.
fn order_versions(entries: &mut [Entry]) {
    let mut groups: HashMap<(bool, &str), Vec<(usize, Version)>> = HashMap::new();
    for (slot, entry) in entries.iter().enumerate() {
        if let Some((version, _, offset)) = guess_version(&entry.name) {
            groups
                .entry((entry.is_directory(), &entry.name[..offset]))
                .or_default()
                .push((slot, version));
        }
    }

    let mut moves: Vec<(Vec<usize>, Vec<usize>)> = Vec::new();
    for mut members in groups.into_values().filter(|members| members.len() > 1) {
        let slots: Vec<usize> = members.iter().map(|(slot, _)| *slot).collect();
        members.sort_by(|(_, a), (_, b)| a.compare_descending(b));
        moves.push((slots, members.into_iter().map(|(slot, _)| slot).collect()));
    }

    for (slots, ranked) in moves {
        let reordered: Vec<Entry> = ranked
            .iter()
            .map(|&from| std::mem::take(&mut entries[from]))
            .collect();
        for (slot, entry) in slots.into_iter().zip(reordered) {
            entries[slot] = entry;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use chrono::DateTime;

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn aggregator(
        mounts: Vec<Mount>,
        backend: Arc<MemoryBackend>,
        options: ListingOptions,
    ) -> ListingAggregator {
        ListingAggregator::new(Arc::new(MountTable::new(mounts)), backend, options)
    }

    fn object_entry(name: &str) -> Entry {
        Entry {
            name: name.into(),
            size: Some(1),
            ..Entry::default()
        }
    }

    #[tokio::test]
    async fn objects_precede_common_prefixes() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put("bucketX", "sub/inner.txt", "x", DateTime::from_timestamp(1, 0).unwrap());
        let mut attrs = backend.put(
            "bucketX",
            "file.txt",
            "0123456789",
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        );
        attrs.content_hash = Some("abc".into());
        backend.put_with(attrs.clone(), "0123456789");

        let listing = aggregator(
            vec![Mount::new("/a/", "bucketX", "")],
            backend,
            ListingOptions::default(),
        )
        .list("/a/")
        .await;

        assert_eq!(listing.entries.len(), 2);
        assert_eq!(listing.entries[0], Entry::object("file.txt", &attrs));
        assert_eq!(listing.entries[0].size, Some(10));
        assert_eq!(listing.entries[0].fingerprint.as_deref(), Some("abc"));
        assert_eq!(listing.entries[1], Entry::directory("sub/"));
        assert!(listing.readme.is_none());
    }

    #[tokio::test]
    async fn child_mounts_merge_with_backend_prefixes() {
        let backend = Arc::new(MemoryBackend::new());
        let at = DateTime::from_timestamp(1, 0).unwrap();
        backend.put("root", "docs/guide.md", "g", at);
        backend.put("root", "zeta.txt", "z", at);

        let listing = aggregator(
            vec![
                Mount::new("/", "root", ""),
                Mount::new("/docs/", "docs", ""),
                Mount::new("/media/images/", "img", ""),
                Mount::new("/media/video/", "vid", ""),
            ],
            backend,
            ListingOptions::default(),
        )
        .list("/")
        .await;

        assert_eq!(names(&listing.entries), vec!["zeta.txt", "docs/", "media/"]);
    }

    #[tokio::test]
    async fn backend_prefix_is_stripped_and_placeholder_skipped() {
        let backend = Arc::new(MemoryBackend::new());
        let at = DateTime::from_timestamp(1, 0).unwrap();
        backend.put("b", "site/pub/", "", at);
        backend.put("b", "site/pub/index.html", "<html>", at);
        backend.put("b", "site/pub/css/app.css", "body{}", at);
        backend.put("b", "site/private.txt", "secret", at);

        let listing = aggregator(
            vec![Mount::new("/www/", "b", "site/")],
            backend,
            ListingOptions::default(),
        )
        .list("/www/pub/")
        .await;

        assert_eq!(names(&listing.entries), vec!["index.html", "css/"]);
    }

    #[tokio::test]
    async fn readme_is_detected_case_insensitively() {
        let backend = Arc::new(MemoryBackend::new());
        let at = DateTime::from_timestamp(1, 0).unwrap();
        backend.put("b", "Readme.MD", "# hi", at);
        backend.put("b", "a.txt", "a", at);
        let mounts = vec![Mount::new("/", "b", "")];

        let shown = aggregator(mounts.clone(), backend.clone(), ListingOptions::default())
            .list("/")
            .await;
        assert_eq!(names(&shown.entries), vec!["Readme.MD", "a.txt"]);
        assert_eq!(shown.readme.unwrap().name, "Readme.MD");

        let options = ListingOptions {
            skip_readme: true,
            ..ListingOptions::default()
        };
        let hidden = aggregator(mounts, backend, options).list("/").await;
        assert_eq!(names(&hidden.entries), vec!["a.txt"]);
        assert_eq!(hidden.readme.unwrap().name, "Readme.MD");
    }

    #[tokio::test]
    async fn listing_failure_keeps_partial_results() {
        let backend = Arc::new(MemoryBackend::new());
        let at = DateTime::from_timestamp(1, 0).unwrap();
        backend.put("b", "a.txt", "a", at);
        backend.put("b", "b.txt", "b", at);
        backend.fail_listing_after(1);

        let listing = aggregator(
            vec![Mount::new("/", "b", ""), Mount::new("/extra/", "e", "")],
            backend,
            ListingOptions::default(),
        )
        .list("/")
        .await;

        assert_eq!(names(&listing.entries), vec!["a.txt", "extra/"]);
    }

    #[tokio::test]
    async fn unmounted_path_lists_only_children() {
        let backend = Arc::new(MemoryBackend::new());
        let listing = aggregator(
            vec![Mount::new("/x/y/", "b", "")],
            backend,
            ListingOptions::default(),
        )
        .list("/x/")
        .await;

        assert_eq!(names(&listing.entries), vec!["y/"]);
    }

    #[test]
    fn merge_drops_only_adjacent_duplicates() {
        let merged = merge_entries(
            vec![
                Entry::directory("dup/"),
                Entry::directory("x"),
                object_entry("x"),
                Entry::directory("dup/"),
                object_entry("b"),
            ],
            false,
        );
        assert_eq!(names(&merged), vec!["b", "x", "dup/", "x"]);
    }

    #[test]
    fn merge_keeps_first_of_equal_names() {
        let mut mount_entry = Entry::directory("sub/");
        mount_entry.fingerprint = Some("mount".into());
        let merged = merge_entries(vec![mount_entry.clone(), Entry::directory("sub/")], false);
        assert_eq!(merged, vec![mount_entry]);
    }

    #[test]
    fn version_sort_orders_highest_first_within_same_text() {
        let entries = vec![
            object_entry("app-1.9.0.tgz"),
            object_entry("other.txt"),
            object_entry("app-2.0.0-rc.1.tgz"),
            object_entry("app-1.10.0.tgz"),
            object_entry("app-2.0.0.tgz"),
        ];

        let plain = merge_entries(entries.clone(), false);
        assert_eq!(
            names(&plain),
            vec![
                "app-1.10.0.tgz",
                "app-1.9.0.tgz",
                "app-2.0.0-rc.1.tgz",
                "app-2.0.0.tgz",
                "other.txt"
            ]
        );

        let versioned = merge_entries(entries, true);
        assert_eq!(
            names(&versioned),
            vec![
                "app-2.0.0.tgz",
                "app-2.0.0-rc.1.tgz",
                "app-1.10.0.tgz",
                "app-1.9.0.tgz",
                "other.txt"
            ]
        );
    }

    #[test]
    fn version_sort_leaves_unversioned_neighbours_in_name_order() {
        let merged = merge_entries(
            vec![object_entry("app-v2.0.tgz"), object_entry("app-latest.txt")],
            true,
        );
        assert_eq!(names(&merged), vec!["app-latest.txt", "app-v2.0.tgz"]);
    }

    #[test]
    fn version_sort_only_swaps_within_shared_text() {
        let merged = merge_entries(
            vec![
                object_entry("tool-1.0.zip"),
                object_entry("app-1.0.zip"),
                object_entry("beta.txt"),
                object_entry("tool-2.0.zip"),
                object_entry("app-3.0.zip"),
            ],
            true,
        );
        assert_eq!(
            names(&merged),
            vec![
                "app-3.0.zip",
                "app-1.0.zip",
                "beta.txt",
                "tool-2.0.zip",
                "tool-1.0.zip"
            ]
        );
    }

    #[test]
    fn version_sort_keeps_bands() {
        let merged = merge_entries(
            vec![Entry::directory("v2/"), object_entry("v1.txt"), Entry::directory("v10/")],
            true,
        );
        assert_eq!(names(&merged), vec!["v1.txt", "v10/", "v2/"]);
    }
}
