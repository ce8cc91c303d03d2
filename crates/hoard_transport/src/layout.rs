//! URL layout of cached objects.

use hoard_common::{ProjectId, CACHE_SCHEMA_VERSION};

/// Path of a cached object relative to a store base URL:
/// `{schema}/{groupId}/{artifactId}/{fingerprint}/{file}`.
pub fn resource_path(project: &ProjectId, fingerprint: &str, file_name: &str) -> String {
    format!(
        "{CACHE_SCHEMA_VERSION}/{}/{}/{fingerprint}/{file_name}",
        project.group_id, project.artifact_id
    )
}

/// Returns true if `url` carries a scheme.
pub fn is_absolute(url: &str) -> bool {
    url.contains("://")
}

/// Joins a relative path onto a base URL. Absolute URLs pass through.
pub fn join_url(base: &str, url: &str) -> String {
    if is_absolute(url) {
        return url.to_string();
    }
    let base = base.trim_end_matches('/');
    let path = url.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_path_layout() {
        let project = ProjectId::new("org.acme", "core", "1.0");
        assert_eq!(
            resource_path(&project, "abc", "buildinfo.json"),
            "v1/org.acme/core/abc/buildinfo.json"
        );
    }

    #[test]
    fn join_handles_slashes() {
        assert_eq!(join_url("https://c/builds", "v1/x"), "https://c/builds/v1/x");
        assert_eq!(join_url("https://c/builds/", "/v1/x"), "https://c/builds/v1/x");
    }

    #[test]
    fn absolute_urls_pass_through() {
        assert_eq!(
            join_url("https://c/builds", "file:///tmp/report.json"),
            "file:///tmp/report.json"
        );
    }
}
