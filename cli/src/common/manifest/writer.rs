//! # Merged Manifest Writer
//!
//! File: cli/src/common/manifest/writer.rs
//!
//! ## Overview
//!
//! Builds the single manifest the package manager runs against. The starting point is
//! a JSON template (built in, or `manifests.template`) in which these placeholders are
//! substituted:
//!
//! - `%WORKING_DIR%`: the package manager's working directory
//! - `%VENDOR_DIR%`: the directory dependencies are installed into
//! - `%MINIMUM_STABILITY%`: `manifests.minimum_stability`
//!
//! On top of the template, `require`, `autoload` and `repositories` are set to the
//! union of those keys over all collected packages (later packages win per key;
//! lists accumulate). `require-dev` is set the same way when development dependencies
//! are included and removed when the result is empty.
//!
//! ## Usage
//!
//! ```rust
//! let writer = ManifestWriter::new(&cfg.manifests, &working_dir, cfg.vendor_dir());
//! writer.write(&packages, &writer.default_destination())?;
//! ```
//!
use super::collector::PackageManifest;
use super::merge::{merge_all, ArrayMerge};
use crate::common::fs::io::{read_file_to_string, write_string_to_file};
use crate::core::config::ManifestsConfig;
use crate::core::error::{PmError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the merged manifest inside the working directory.
pub const MANIFEST_FILE_NAME: &str = "composer.json";

/// Template used when `manifests.template` is not configured.
pub const DEFAULT_TEMPLATE: &str = r#"{
    "name": "pmbridge/merged-dependencies",
    "description": "Dependencies merged from all local packages by pmbridge",
    "type": "project",
    "license": "proprietary",
    "minimum-stability": "%MINIMUM_STABILITY%",
    "prefer-stable": true,
    "config": {
        "vendor-dir": "%VENDOR_DIR%",
        "bin-dir": "%WORKING_DIR%/bin",
        "optimize-autoloader": true
    },
    "require": {},
    "autoload": {},
    "repositories": []
}
"#;

/// Keys merged from the package manifests into the template.
const MERGED_KEYS: &[&str] = &["require", "autoload", "repositories"];
const DEV_KEY: &str = "require-dev";

#[derive(Debug)]
pub struct ManifestWriter<'a> {
    config: &'a ManifestsConfig,
    working_dir: PathBuf,
    vendor_dir: PathBuf,
    include_dev: bool,
}

impl<'a> ManifestWriter<'a> {
    pub fn new(
        config: &'a ManifestsConfig,
        working_dir: impl Into<PathBuf>,
        vendor_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            working_dir: working_dir.into(),
            vendor_dir: vendor_dir.into(),
            include_dev: config.include_dev,
        }
    }

    /// Overrides `manifests.include_dev` (e.g. for `--no-dev`).
    pub fn include_dev(mut self, include_dev: bool) -> Self {
        self.include_dev = include_dev;
        self
    }

    /// `<working_dir>/composer.json`
    pub fn default_destination(&self) -> PathBuf {
        self.working_dir.join(MANIFEST_FILE_NAME)
    }

    /// The merged manifest as a JSON document.
    pub fn build(&self, packages: &[PackageManifest]) -> Result<Value> {
        let mut document = self.load_template()?;

        for key in MERGED_KEYS {
            document.insert((*key).to_string(), merged_section(packages, key));
        }

        let require_dev = if self.include_dev {
            Some(merged_section(packages, DEV_KEY))
        } else {
            None
        };
        match require_dev {
            Some(value) if !is_empty(&value) => {
                document.insert(DEV_KEY.to_string(), value);
            }
            _ => {
                document.remove(DEV_KEY);
            }
        }
        Ok(Value::Object(document))
    }

    /// Pretty-printed manifest with a trailing newline.
    pub fn render(&self, packages: &[PackageManifest]) -> Result<String> {
        let document = self.build(packages)?;
        let mut rendered = serde_json::to_string_pretty(&document)
            .map_err(|e| PmError::Manifest(format!("Could not serialize manifest: {}", e)))?;
        rendered.push('\n');
        Ok(rendered)
    }

    /// Renders and writes the manifest to `destination`.
    pub fn write(&self, packages: &[PackageManifest], destination: &Path) -> Result<()> {
        let rendered = self.render(packages)?;
        write_string_to_file(destination, &rendered)?;
        info!(
            "Wrote merged manifest for {} package(s) to {:?}",
            packages.len(),
            destination
        );
        Ok(())
    }

    fn load_template(&self) -> Result<Map<String, Value>> {
        let raw = match &self.config.template {
            Some(path) => {
                debug!("Using manifest template {}", path);
                read_file_to_string(Path::new(path))?
            }
            None => DEFAULT_TEMPLATE.to_string(),
        };
        let substituted = raw
            .replace("%WORKING_DIR%", &json_escape(&self.working_dir.to_string_lossy()))
            .replace("%VENDOR_DIR%", &json_escape(&self.vendor_dir.to_string_lossy()))
            .replace("%MINIMUM_STABILITY%", &json_escape(&self.config.minimum_stability));

        match serde_json::from_str::<Value>(&substituted) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(PmError::Manifest("Manifest template is not a JSON object".to_string()).into()),
            Err(e) => Err(PmError::Manifest(format!("Could not parse manifest template: {}", e)).into()),
        }
    }
}

fn merged_section(packages: &[PackageManifest], key: &str) -> Value {
    let sections = packages
        .iter()
        .filter_map(|package| package.manifest.get(key))
        .cloned();

    // `repositories` is a list of repository definitions; keep each one once.
    if key == "repositories" {
        let mut merged = Vec::new();
        for item in sections
            .filter_map(|section| match section {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .flatten()
        {
            if !merged.contains(&item) {
                merged.push(item);
            }
        }
        return Value::Array(merged);
    }
    merge_all(sections.filter(Value::is_object), ArrayMerge::Union)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

/// Escapes `raw` for use inside a JSON string literal.
fn json_escape(raw: &str) -> String {
    let quoted = Value::String(raw.to_string()).to_string();
    quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(&quoted)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn package(key: &str, manifest: Value) -> PackageManifest {
        PackageManifest {
            key: key.to_string(),
            dir: PathBuf::from("/srv/packages").join(key),
            manifest: manifest.as_object().cloned().unwrap(),
        }
    }

    fn writer(config: &ManifestsConfig) -> ManifestWriter<'_> {
        ManifestWriter::new(config, "/srv/work", "/srv/work/vendor")
    }

    #[test]
    fn test_template_placeholders_are_substituted() -> Result<()> {
        let config = ManifestsConfig {
            minimum_stability: "beta".to_string(),
            ..ManifestsConfig::default()
        };
        let document = writer(&config).build(&[])?;
        assert_eq!(document["minimum-stability"], "beta");
        assert_eq!(document["config"]["vendor-dir"], "/srv/work/vendor");
        assert_eq!(document["config"]["bin-dir"], "/srv/work/bin");
        assert_eq!(document["repositories"], json!([]));
        assert!(document.get("require-dev").is_none());
        Ok(())
    }

    #[test]
    fn test_sections_are_merged_across_packages() -> Result<()> {
        let config = ManifestsConfig::default();
        let packages = [
            package(
                "blog",
                json!({
                    "require": {"a/a": "^1.0", "shared/lib": "^1.0"},
                    "autoload": {"psr-4": {"Blog\\": "../packages/blog/src/"}, "classmap": ["../packages/blog/lib/"]},
                    "repositories": [{"type": "vcs", "url": "https://example.com/a.git"}]
                }),
            ),
            package(
                "shop",
                json!({
                    "require": {"shared/lib": "^2.0"},
                    "autoload": {"psr-4": {"Shop\\": "../packages/shop/src/"}, "classmap": ["../packages/shop/lib/"]},
                    "repositories": [
                        {"type": "vcs", "url": "https://example.com/a.git"},
                        {"type": "composer", "url": "https://packages.example.com"}
                    ]
                }),
            ),
        ];
        let document = writer(&config).build(&packages)?;

        assert_eq!(document["require"], json!({"a/a": "^1.0", "shared/lib": "^2.0"}));
        assert_eq!(
            document["autoload"]["classmap"],
            json!(["../packages/blog/lib/", "../packages/shop/lib/"])
        );
        assert_eq!(document["autoload"]["psr-4"]["Shop\\"], "../packages/shop/src/");
        assert_eq!(document["repositories"].as_array().map(Vec::len), Some(2));
        Ok(())
    }

    #[test]
    fn test_require_dev_included_only_when_requested_and_non_empty() -> Result<()> {
        let config = ManifestsConfig::default();
        let packages = [package("blog", json!({"require-dev": {"phpunit/phpunit": "^10"}}))];

        let with_dev = writer(&config).build(&packages)?;
        assert_eq!(with_dev["require-dev"], json!({"phpunit/phpunit": "^10"}));

        let without_dev = writer(&config).include_dev(false).build(&packages)?;
        assert!(without_dev.get("require-dev").is_none());

        let empty = writer(&config).build(&[package("x", json!({"require-dev": {}}))])?;
        assert!(empty.get("require-dev").is_none());
        Ok(())
    }

    #[test]
    fn test_custom_template_and_write() -> Result<()> {
        let dir = tempdir()?;
        let template = dir.path().join("template.json");
        fs::write(
            &template,
            r#"{"name": "custom/app", "extra": {"root": "%WORKING_DIR%"}, "require-dev": {"x/y": "1"}}"#,
        )?;
        let config = ManifestsConfig {
            template: Some(template.to_string_lossy().into_owned()),
            ..ManifestsConfig::default()
        };
        let writer = writer(&config).include_dev(false);
        let destination = dir.path().join("out/composer.json");
        writer.write(&[package("a", json!({"require": {"a/a": "*"}}))], &destination)?;

        let written: Value = serde_json::from_str(&fs::read_to_string(&destination)?)?;
        assert_eq!(written["name"], "custom/app");
        assert_eq!(written["extra"]["root"], "/srv/work");
        assert_eq!(written["require"], json!({"a/a": "*"}));
        assert!(written.get("require-dev").is_none());
        Ok(())
    }

    #[test]
    fn test_invalid_template_is_manifest_error() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("template.json");
        fs::write(&template, "[1, 2]").unwrap();
        let config = ManifestsConfig {
            template: Some(template.to_string_lossy().into_owned()),
            ..ManifestsConfig::default()
        };
        let err = writer(&config).build(&[]).unwrap_err();
        assert!(matches!(err.downcast_ref::<PmError>(), Some(PmError::Manifest(_))));
    }

    #[test]
    fn test_json_escape_of_paths() {
        assert_eq!(json_escape("/srv/work"), "/srv/work");
        assert_eq!(json_escape("C:\\work \"x\""), "C:\\\\work \\\"x\\\"");
    }
}
