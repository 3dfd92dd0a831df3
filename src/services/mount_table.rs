//! Virtual path resolution over the configured mounts.

use crate::models::mount::Mount;

/// The configured mounts, sorted most specific first.
///
/// Built once at startup and read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    /// Sort by descending virtual path length, then ascending path, so a
    /// forward scan meets the longest matching prefix first.
    pub fn new(mut mounts: Vec<Mount>) -> Self {
        mounts.sort_by(|a, b| {
            b.virtual_path
                .len()
                .cmp(&a.virtual_path.len())
                .then_with(|| a.virtual_path.cmp(&b.virtual_path))
        });
        Self { mounts }
    }

    /// The mount whose virtual path is the longest prefix of `path`.
    pub fn resolve(&self, path: &str) -> Option<&Mount> {
        self.mounts
            .iter()
            .find(|mount| path.starts_with(&mount.virtual_path))
    }

    /// Immediate child directory names contributed by mounts nested below `path`.
    ///
    /// Several mounts below the same child yield the same name repeatedly.
    pub fn children_of<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.mounts.iter().filter_map(move |mount| {
            if mount.virtual_path == path {
                return None;
            }
            let rest = mount.virtual_path.strip_prefix(path)?;
            rest.split_inclusive('/').next()
        })
    }
}
