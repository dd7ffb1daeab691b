use std::path::{Path, PathBuf};

use regex::Regex;

/// Extensions recognized by file discovery, in the existence-check order
/// used for each candidate base name (spec §4.4).
const EXTENSIONS: [&str; 3] = ["yml", "yaml", "properties"];

/// Enumerate candidate property files under `base_dir` for `(apps, profiles)`
/// given the source's configured `search_paths` (spec §4.4).
///
/// The empty path is always an implicit search path in addition to whatever
/// is configured, matching the root-level fallback the upstream
/// implementation always performs regardless of `searchPaths`.
pub fn discover(base_dir: &Path, search_paths: &[String], apps: &[String], profiles: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for app in apps {
        discover_for_app(base_dir, search_paths, app, profiles, &mut files);
    }
    if !apps.iter().any(|a| a == "application") {
        discover_for_app(base_dir, search_paths, "application", profiles, &mut files);
    }
    files
}

fn discover_for_app(
    base_dir: &Path,
    search_paths: &[String],
    app: &str,
    profiles: &[String],
    out: &mut Vec<PathBuf>,
) {
    let effective_paths: Vec<&str> = std::iter::once("").chain(search_paths.iter().map(String::as_str)).collect();

    for profile in profiles {
        for raw_path in &effective_paths {
            let has_profile_marker = raw_path.contains("{profile}");
            let app_substituted = raw_path.replace("{application}", app);

            for expanded_dir in expand_wildcards(base_dir, &app_substituted.replace("{profile}", profile)) {
                for ext in EXTENSIONS {
                    push_if_exists(out, &expanded_dir, &format!("{app}-{profile}.{ext}"));
                }
                if has_profile_marker {
                    for ext in EXTENSIONS {
                        push_if_exists(out, &expanded_dir, &format!("{app}.{ext}"));
                    }
                }
            }
        }
    }

    for raw_path in &effective_paths {
        if raw_path.contains("{profile}") {
            continue;
        }
        let app_substituted = raw_path.replace("{application}", app);
        for expanded_dir in expand_wildcards(base_dir, &app_substituted) {
            for ext in EXTENSIONS {
                push_if_exists(out, &expanded_dir, &format!("{app}.{ext}"));
            }
        }
    }
}

fn push_if_exists(out: &mut Vec<PathBuf>, dir: &Path, name: &str) {
    let candidate = dir.join(name);
    if candidate.is_file() {
        out.push(candidate);
    }
}

/// Expand `*`-wildcard path segments to directories that actually exist
/// under `base_dir`, matching each wildcard segment as an anchored regex
/// (`*` → `.*`).
fn expand_wildcards(base_dir: &Path, relative: &str) -> Vec<PathBuf> {
    let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
    let mut current = vec![base_dir.to_path_buf()];

    for segment in segments {
        if segment.contains('*') {
            let pattern = wildcard_regex(segment);
            let mut next = Vec::new();
            for dir in &current {
                let Ok(entries) = std::fs::read_dir(dir) else {
                    continue;
                };
                for entry in entries.flatten() {
                    if !entry.path().is_dir() {
                        continue;
                    }
                    if let Some(name) = entry.file_name().to_str() {
                        if pattern.is_match(name) {
                            next.push(entry.path());
                        }
                    }
                }
            }
            current = next;
        } else {
            current.retain(|d| d.join(segment).is_dir());
            current = current.into_iter().map(|d| d.join(segment)).collect();
        }
    }

    current
}

fn wildcard_regex(segment: &str) -> Regex {
    let escaped = regex::escape(segment).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$")).expect("wildcard segment produces a valid regex")
}

/// Locate an import target filename under the configured search paths
/// (spec §4.4 "Import resolution"), expanding placeholders the same way
/// file discovery does but without the profile/app naming convention.
pub fn locate_import(base_dir: &Path, search_paths: &[String], app: &str, profile: &str, filename: &str) -> Option<PathBuf> {
    let effective_paths: Vec<&str> = std::iter::once("").chain(search_paths.iter().map(String::as_str)).collect();
    for raw_path in effective_paths {
        let substituted = raw_path
            .replace("{application}", app)
            .replace("{profile}", profile);
        for dir in expand_wildcards(base_dir, &substituted) {
            let candidate = dir.join(filename);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn discovers_app_profile_file_in_root() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("svc-dev.yml"), "a: 1").unwrap();

        let found = discover(dir.path(), &[], &["svc".to_string()], &["dev".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name().unwrap(), "svc-dev.yml");
    }

    #[test]
    fn discovers_app_only_file_when_no_profile_match() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("svc.yml"), "a: 9").unwrap();

        let found = discover(dir.path(), &[], &["svc".to_string()], &["dev".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name().unwrap(), "svc.yml");
    }

    #[test]
    fn expands_application_placeholder_in_search_path() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("svc")).unwrap();
        fs::write(dir.path().join("svc").join("svc-dev.yml"), "a: 1").unwrap();

        let found = discover(
            dir.path(),
            &["{application}".to_string()],
            &["svc".to_string()],
            &["dev".to_string()],
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn wildcard_segment_matches_existing_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("team-a")).unwrap();
        fs::write(dir.path().join("team-a").join("svc.yml"), "a: 1").unwrap();

        let found = discover(
            dir.path(),
            &["team-*".to_string()],
            &["svc".to_string()],
            &["dev".to_string()],
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn default_application_is_added_when_not_requested() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("application.yml"), "a: 1").unwrap();

        let found = discover(dir.path(), &[], &["svc".to_string()], &["dev".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name().unwrap(), "application.yml");
    }

    #[test]
    fn locate_import_finds_filename_under_search_path() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("shared")).unwrap();
        fs::write(dir.path().join("shared").join("extra.yml"), "x: 1").unwrap();

        let found = locate_import(dir.path(), &["shared".to_string()], "svc", "dev", "extra.yml");
        assert_eq!(found.unwrap().file_name().unwrap(), "extra.yml");
    }
}
