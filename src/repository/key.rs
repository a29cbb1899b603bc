//! Repository address parsing and cache key derivation

use crate::error::{RepoCacheError, RepoCacheResult};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Length of the hash suffix appended to rewritten commit-ishes
const COMMITISH_HASH_LEN: usize = 12;

/// Joins host, org and repo in a cache name. Never valid inside a part.
const PART_SEPARATOR: char = '+';

/// Joins a repository cache name and a commit-ish. Never valid inside a part.
const COMMITISH_SEPARATOR: char = '@';

/// Normalized identity of a remote repository
///
/// All parts are lowercase, so addresses that differ only in letter case
/// map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoKey {
    pub host: String,
    pub org: String,
    pub repo: String,
}

impl RepoKey {
    /// Parse a remote address
    ///
    /// Accepts `git@host:org/repo`, `ssh://[user@]host[:port]/org/repo` and
    /// `http(s)://host/org/repo`, each with an optional `.git` suffix.
    pub fn parse(url: &str) -> RepoCacheResult<Self> {
        let invalid = || RepoCacheError::InvalidRepository(url.to_string());
        let lowered = url.trim().to_ascii_lowercase();

        let (host, path) = if let Some(rest) = lowered
            .strip_prefix("ssh://")
            .or_else(|| lowered.strip_prefix("https://"))
            .or_else(|| lowered.strip_prefix("http://"))
        {
            let (authority, path) = rest.split_once('/').ok_or_else(invalid)?;
            let host = authority.rsplit('@').next().unwrap_or(authority);
            let host = host.split(':').next().unwrap_or(host);
            (host.to_string(), path.to_string())
        } else if let Some((user_host, path)) = lowered.split_once(':') {
            let (_, host) = user_host.split_once('@').ok_or_else(invalid)?;
            (host.to_string(), path.to_string())
        } else {
            return Err(invalid());
        };

        if !is_safe_segment(&host) {
            return Err(invalid());
        }

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let segments: Vec<&str> = path.split('/').collect();
        let [org, repo] = segments.as_slice() else {
            return Err(invalid());
        };
        if !is_safe_segment(org) || !is_safe_segment(repo) {
            return Err(invalid());
        }

        Ok(Self {
            host,
            org: (*org).to_string(),
            repo: (*repo).to_string(),
        })
    }

    /// Directory name shared by the mirror and every snapshot of this repository
    ///
    /// Parts are joined with a character no part may contain, so distinct
    /// repositories (including the same org/repo on different hosts) never
    /// share a name.
    pub fn cache_name(&self) -> String {
        format!(
            "{host}{sep}{org}{sep}{repo}",
            host = self.host,
            org = self.org,
            repo = self.repo,
            sep = PART_SEPARATOR
        )
    }

    /// Directory name of the snapshot of this repository at `commitish`
    pub fn snapshot_name(&self, commitish: &str) -> RepoCacheResult<String> {
        Ok(format!(
            "{}{}{}",
            self.cache_name(),
            COMMITISH_SEPARATOR,
            commitish_component(commitish)?
        ))
    }
}

impl FromStr for RepoKey {
    type Err = RepoCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.org, self.repo)
    }
}

/// Filesystem-safe form of a commit-ish
///
/// Safe commit-ishes are used as is. Anything else (e.g. `feature/x`) has
/// unsafe characters replaced and a short hash of the original appended, so
/// distinct refs never share a snapshot.
pub fn commitish_component(commitish: &str) -> RepoCacheResult<String> {
    if commitish.is_empty() {
        return Err(RepoCacheError::invalid_field("commitish", "must not be empty"));
    }
    if is_safe_segment(commitish) {
        return Ok(commitish.to_string());
    }

    let cleaned: String = commitish
        .chars()
        .map(|c| if is_safe_char(c) { c } else { '-' })
        .collect();
    let digest = hex::encode(Sha256::digest(commitish.as_bytes()));
    Ok(format!("{}-{}", cleaned, &digest[..COMMITISH_HASH_LEN]))
}

/// Mirror location for `url` under the repositories pool
pub fn resolve_mirror_path(repositories: &Path, url: &str) -> RepoCacheResult<PathBuf> {
    let key = RepoKey::parse(url)?;
    Ok(repositories.join(key.cache_name()))
}

/// Snapshot location for `url` at `commitish` under the commitishes pool
pub fn resolve_snapshot_path(
    commitishes: &Path,
    url: &str,
    commitish: &str,
) -> RepoCacheResult<PathBuf> {
    let key = RepoKey::parse(url)?;
    Ok(commitishes.join(key.snapshot_name(commitish)?))
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment.chars().all(is_safe_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scp_style() {
        let key = RepoKey::parse("git@github.com:acme/widgets.git").unwrap();
        assert_eq!(key.host, "github.com");
        assert_eq!(key.org, "acme");
        assert_eq!(key.repo, "widgets");
        assert_eq!(key.cache_name(), "github.com+acme+widgets");
        assert_eq!(key.to_string(), "github.com/acme/widgets");
    }

    #[test]
    fn parses_url_styles() {
        for url in [
            "https://github.com/acme/widgets",
            "https://github.com/acme/widgets.git",
            "http://github.com/acme/widgets/",
            "ssh://git@github.com/acme/widgets.git",
            "ssh://git@github.com:22/acme/widgets",
        ] {
            let key: RepoKey = url.parse().unwrap();
            assert_eq!(key.cache_name(), "github.com+acme+widgets", "{}", url);
            assert_eq!(key.host, "github.com", "{}", url);
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for url in [
            "",
            "github.com/acme/widgets",
            "git@github.com:acme",
            "git@github.com:acme/widgets/extra",
            "https://github.com/acme",
            "https://github.com//widgets",
            "git@github.com:acme/wid gets",
            "git@github.com:../widgets",
            "github.com:acme/widgets",
            "ftp://github.com/acme/widgets",
            "git@git+hub.com:acme/widgets",
            "git@:acme/widgets",
        ] {
            let err = RepoKey::parse(url).unwrap_err();
            assert!(
                matches!(err, RepoCacheError::InvalidRepository(_)),
                "{} gave {:?}",
                url,
                err
            );
        }
    }

    #[test]
    fn letter_case_does_not_change_paths() {
        let pool = Path::new("/cache/repositories");
        let snaps = Path::new("/cache/commitishes");
        let variants = [
            "git@github.com:acme/widgets",
            "git@GitHub.com:ACME/Widgets",
            "GIT@GITHUB.COM:Acme/WIDGETS.GIT",
        ];

        let mirror = resolve_mirror_path(pool, variants[0]).unwrap();
        let snapshot = resolve_snapshot_path(snaps, variants[0], "abc123").unwrap();
        assert_eq!(
            mirror,
            Path::new("/cache/repositories/github.com+acme+widgets")
        );
        assert_eq!(
            snapshot,
            Path::new("/cache/commitishes/github.com+acme+widgets@abc123")
        );

        for url in &variants[1..] {
            assert_eq!(resolve_mirror_path(pool, url).unwrap(), mirror);
            assert_eq!(resolve_snapshot_path(snaps, url, "abc123").unwrap(), snapshot);
        }
    }

    #[test]
    fn hosts_do_not_share_entries() {
        let pool = Path::new("/cache/repositories");
        let snaps = Path::new("/cache/commitishes");
        let github = "git@github.com:acme/widgets.git";
        let gitlab = "git@gitlab.com:acme/widgets.git";

        assert_ne!(
            resolve_mirror_path(pool, github).unwrap(),
            resolve_mirror_path(pool, gitlab).unwrap()
        );
        assert_ne!(
            resolve_snapshot_path(snaps, github, "abc123").unwrap(),
            resolve_snapshot_path(snaps, gitlab, "abc123").unwrap()
        );
    }

    #[test]
    fn dotted_names_do_not_collide() {
        let snaps = Path::new("/cache/commitishes");
        let pool = Path::new("/cache/repositories");

        assert_ne!(
            resolve_snapshot_path(snaps, "git@github.com:acme/widgets", "v1.2").unwrap(),
            resolve_snapshot_path(snaps, "git@github.com:acme/widgets.v1", "2").unwrap()
        );
        assert_ne!(
            resolve_mirror_path(pool, "git@github.com:acme.tools/widgets").unwrap(),
            resolve_mirror_path(pool, "git@github.com:acme/tools.widgets").unwrap()
        );
        // A mirror name is never mistaken for a snapshot name
        assert_ne!(
            resolve_mirror_path(snaps, "git@github.com:acme/widgets").unwrap(),
            resolve_snapshot_path(snaps, "git@github.com:acme/widgets", "x").unwrap()
        );
    }

    #[test]
    fn commitish_keeps_case() {
        assert_eq!(commitish_component("Release-1.2").unwrap(), "Release-1.2");
        assert_ne!(
            commitish_component("Main").unwrap(),
            commitish_component("main").unwrap()
        );
    }

    #[test]
    fn unsafe_commitish_is_rewritten() {
        let a = commitish_component("feature/x").unwrap();
        let b = commitish_component("feature-x").unwrap();
        let c = commitish_component("feature:x").unwrap();

        assert!(a.starts_with("feature-x-"));
        assert_eq!(a.len(), "feature-x-".len() + COMMITISH_HASH_LEN);
        assert!(!a.contains('/'));
        assert_eq!(b, "feature-x");
        assert_ne!(a, c);
        assert_eq!(a, commitish_component("feature/x").unwrap());
    }

    #[test]
    fn dot_commitish_is_rewritten() {
        let path = resolve_snapshot_path(Path::new("/c"), "git@h:o/r", "..").unwrap();
        assert_eq!(path.parent(), Some(Path::new("/c")));
    }

    #[test]
    fn empty_commitish_is_validation_error() {
        let err = commitish_component("").unwrap_err();
        assert!(matches!(
            err,
            RepoCacheError::InvalidField {
                field: "commitish",
                ..
            }
        ));
    }
}
