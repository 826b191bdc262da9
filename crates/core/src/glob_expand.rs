use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use glob::{MatchOptions, Pattern};

use crate::error::{Result, SosError};
use crate::sandbox;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

#[derive(Debug)]
enum Segment {
    Literal(String),
    Wildcard(Pattern),
}

pub(crate) fn has_wildcards(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>> {
    let trimmed = pattern.trim();
    if trimmed.contains("**") {
        return Err(SosError::invalid_pattern(
            trimmed,
            "recursive '**' patterns are not supported",
        ));
    }
    if trimmed.starts_with('/') {
        return Err(SosError::invalid_pattern(
            trimmed,
            "pattern must be relative to the report root",
        ));
    }

    let mut segments = Vec::new();
    for raw in trimmed.split('/') {
        match raw {
            "" | "." => {}
            ".." => {
                return Err(SosError::invalid_pattern(
                    trimmed,
                    "'..' segments are not allowed",
                ))
            }
            literal if !has_wildcards(literal) => segments.push(Segment::Literal(literal.to_string())),
            wildcard => {
                let compiled = Pattern::new(wildcard)
                    .map_err(|err| SosError::invalid_pattern(trimmed, err.msg))?;
                segments.push(Segment::Wildcard(compiled));
            }
        }
    }

    if segments.is_empty() {
        return Err(SosError::invalid_pattern(trimmed, "pattern is empty"));
    }
    Ok(segments)
}

/// Checks that `pattern` is an acceptable non-recursive glob without touching the filesystem.
pub fn validate(pattern: &str) -> Result<()> {
    parse_pattern(pattern).map(|_| ())
}

fn join_relative(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

fn sorted_matching_children(root: &Path, base: &str, pattern: &Pattern) -> Vec<String> {
    let dir = if base.is_empty() {
        root.to_path_buf()
    } else {
        root.join(base)
    };
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| match entry.file_name().into_string() {
            Ok(name) => Some(name),
            Err(raw) => {
                log::debug!("skipping non-UTF-8 entry {raw:?} in {}", dir.display());
                None
            }
        })
        .filter(|name| pattern.matches_with(name, MATCH_OPTIONS))
        .collect();
    names.sort();
    names
}

/// Keeps a candidate only if the sandbox accepts it and it is a file, directory or symlink.
/// Intermediate candidates must additionally resolve to a directory.
fn accept_candidate(root: &Path, rel: &str, is_last: bool) -> bool {
    let resolved = match sandbox::resolve(root, rel) {
        Ok(resolved) => resolved,
        Err(err @ SosError::OutOfBounds { .. }) => {
            log::warn!("glob candidate '{rel}' rejected: {err}");
            return false;
        }
        Err(err) => {
            log::debug!("glob candidate '{rel}' dropped: {err}");
            return false;
        }
    };
    if !is_last {
        return resolved.canonical().is_dir();
    }
    fs::symlink_metadata(resolved.lexical())
        .map(|meta| {
            let kind = meta.file_type();
            kind.is_file() || kind.is_dir() || kind.is_symlink()
        })
        .unwrap_or(false)
}

/// Expands a single-level glob under `root` into report-relative paths, in lexical order.
///
/// Wildcards never cross a `/`; `**` is rejected. No match is an empty result, not an error.
pub fn expand(root: &Path, pattern: &str) -> Result<Vec<String>> {
    let segments = parse_pattern(pattern)?;
    let mut current: Vec<String> = vec![String::new()];

    for (idx, segment) in segments.iter().enumerate() {
        let is_last = idx + 1 == segments.len();
        let mut next = Vec::new();
        for base in &current {
            match segment {
                Segment::Literal(name) => {
                    let rel = join_relative(base, name);
                    if accept_candidate(root, &rel, is_last) {
                        next.push(rel);
                    }
                }
                Segment::Wildcard(compiled) => {
                    for name in sorted_matching_children(root, base, compiled) {
                        let rel = join_relative(base, &name);
                        if accept_candidate(root, &rel, is_last) {
                            next.push(rel);
                        }
                    }
                }
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }

    let ordered: BTreeSet<String> = current.into_iter().collect();
    Ok(ordered.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixture() -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("report");
        let net = root.join("sos_commands/networking");
        fs::create_dir_all(&net).unwrap();
        fs::write(net.join("ifconfig_lo"), "lo").unwrap();
        fs::write(net.join("ifconfig_eth0"), "eth0").unwrap();
        fs::write(net.join("ip_addr"), "addr").unwrap();
        fs::create_dir_all(root.join("etc/sysconfig/network-scripts")).unwrap();
        fs::write(root.join("etc/sysconfig/network-scripts/ifcfg-eth0"), "").unwrap();
        fs::write(root.join("etc/.hidden"), "").unwrap();
        let root = root.canonicalize().unwrap();
        (tmp, root)
    }

    #[test]
    fn expands_in_lexical_order() {
        let (_tmp, root) = fixture();
        let matches = expand(&root, "sos_commands/networking/ifconfig*").unwrap();
        assert_eq!(
            matches,
            vec![
                "sos_commands/networking/ifconfig_eth0".to_string(),
                "sos_commands/networking/ifconfig_lo".to_string(),
            ]
        );
    }

    #[test]
    fn no_match_is_empty() {
        let (_tmp, root) = fixture();
        assert!(expand(&root, "sos_commands/networking/ethtool_*").unwrap().is_empty());
        assert!(expand(&root, "sos_commands/missing/*").unwrap().is_empty());
    }

    #[test]
    fn wildcards_work_in_directory_segments() {
        let (_tmp, root) = fixture();
        let matches = expand(&root, "etc/*/network-scripts/ifcfg-?th[0-9]").unwrap();
        assert_eq!(matches, vec!["etc/sysconfig/network-scripts/ifcfg-eth0".to_string()]);
    }

    #[test]
    fn star_does_not_match_leading_dot_or_cross_segments() {
        let (_tmp, root) = fixture();
        assert!(expand(&root, "etc/*").unwrap().iter().all(|p| !p.contains(".hidden")));
        assert!(expand(&root, "sos_commands*ip_addr").unwrap().is_empty());
    }

    #[test]
    fn rejects_recursive_and_escaping_patterns() {
        let (_tmp, root) = fixture();
        for pattern in ["**/ip_addr", "sos_commands/**", "../*", "/etc/*", ""] {
            let err = expand(&root, pattern).unwrap_err();
            assert_eq!(err.code(), "invalid_pattern", "{pattern}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn drops_symlinks_that_escape_the_root() {
        let (tmp, root) = fixture();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("ifconfig_evil"), "").unwrap();
        std::os::unix::fs::symlink(
            outside.join("ifconfig_evil"),
            root.join("sos_commands/networking/ifconfig_zz"),
        )
        .unwrap();
        std::os::unix::fs::symlink(&outside, root.join("sos_commands/escape")).unwrap();

        let matches = expand(&root, "sos_commands/networking/ifconfig*").unwrap();
        assert_eq!(matches.len(), 2);
        assert!(expand(&root, "sos_commands/*/ifconfig_evil").unwrap().is_empty());
    }
}
