//! Reading JSON or YAML input files.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

/// Parse `path` as YAML when its extension is `.yaml`/`.yml`, JSON otherwise.
pub fn read_document(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_str(&raw).with_context(|| format!("invalid YAML in {}", path.display()))
    } else {
        serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn yaml_and_json_parse_to_the_same_value() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("req.json");
        let yaml_path = dir.path().join("req.yml");
        std::fs::File::create(&json_path)
            .unwrap()
            .write_all(br#"{"requestedCredentials": ["kvkNumber"]}"#)
            .unwrap();
        std::fs::File::create(&yaml_path)
            .unwrap()
            .write_all(b"requestedCredentials:\n  - kvkNumber\n")
            .unwrap();
        assert_eq!(read_document(&json_path).unwrap(), read_document(&yaml_path).unwrap());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_document(Path::new("/nonexistent/wallet.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/wallet.json"));
    }
}
