//! Lookup of bundled StationXML documents.

use std::path::PathBuf;

/// Directory holding the root `Cargo.toml`, two levels above this crate.
fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .map(PathBuf::from)
        .unwrap_or(manifest_dir)
}

/// Locate a test document by file name.
///
/// `$TEST_DATA_DIR` wins when set; otherwise the bundled documents under
/// `crates/stationxml/testdata/` are searched, then a workspace-level
/// `testdata/`. Site dumps too large to bundle go in `$TEST_DATA_DIR`.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let root = workspace_root();
    let mut candidates: Vec<PathBuf> = std::env::var_os("TEST_DATA_DIR")
        .map(|dir| PathBuf::from(dir).join(name))
        .into_iter()
        .collect();
    candidates.push(root.join("crates/stationxml/testdata").join(name));
    candidates.push(root.join("testdata").join(name));

    candidates.into_iter().find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_holds_manifest() {
        assert!(workspace_root().join("Cargo.toml").is_file());
        assert!(workspace_root().join("crates/test-utils").is_dir());
    }

    #[test]
    fn test_finds_bundled_document() {
        let path = find_test_file("uw_ratt.xml").unwrap();
        assert!(path.ends_with("uw_ratt.xml"));
    }

    #[test]
    fn test_missing_document_is_none() {
        assert!(find_test_file("no_such_network.xml").is_none());
    }
}
