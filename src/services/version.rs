//! Version-like substrings embedded in names, used as a sort tie-break.

use regex::Regex;
use std::{cmp::Ordering, sync::LazyLock};

/// Optional `v`, dotted numeric core, optional pre-release, optional build metadata.
///
/// Pre-release prefers the longest run so `1.2.3-rc.10` stays whole. Dotted
/// continuations must start with a digit, which keeps file extensions such
/// as `.tar.gz` out of the match.
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"v?([0-9]+(?:\.[0-9]+)*)",
        r"(?:-([0-9]+[0-9A-Za-z\-~]*(?:\.[0-9][0-9A-Za-z\-~]*)*)",
        r"|-?([A-Za-z\-~]+[0-9A-Za-z\-~]*(?:\.[0-9][0-9A-Za-z\-~]*)*))?",
        r"(?:\+([0-9A-Za-z\-~]+(?:\.[0-9][0-9A-Za-z\-~]*)*))?",
    ))
    .expect("version pattern is valid")
});

/// A parsed version. Build metadata is matched but not kept, so it never
/// takes part in comparisons. `1.2` and `1.2.0` are equal.
#[derive(Clone, Debug)]
pub struct Version {
    segments: Vec<u64>,
    pre: String,
}

impl Version {
    /// Higher versions first.
    pub fn compare_descending(&self, other: &Version) -> Ordering {
        other.cmp(self)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len()).max(3);
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        compare_prereleases(&self.pre, &other.pre)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A release sorts above any of its pre-releases.
fn compare_prereleases(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(x), Some(y)) => match compare_identifiers(x, y) {
                Ordering::Equal => {}
                unequal => return unequal,
            },
        }
    }
}

/// Numeric identifiers compare numerically and sort below alphanumeric ones.
fn compare_identifiers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Find the first version-like substring of `name`.
///
/// Returns the version, the matched text and its byte offset.
pub fn guess_version(name: &str) -> Option<(Version, &str, usize)> {
    let caps = VERSION_RE.captures(name)?;
    let whole = caps.get(0)?;

    let segments = caps
        .get(1)?
        .as_str()
        .split('.')
        .map(|s| s.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let pre = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    Some((
        Version { segments, pre },
        whole.as_str(),
        whole.start(),
    ))
}
