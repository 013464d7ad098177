//! `idlgen.toml`: per-project defaults for the command line.
//!
//! ```toml
//! [generate]
//! source = "model"
//! module = "blog_api"
//! app = "blog"
//! output = "src"
//! emit = ["types", "client"]
//! skip-existing = true
//! formatter = "ruff format"
//! ```
//!
//! Every key is optional and every key is overridden by its flag. Relative
//! paths are taken relative to the file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use idlgen_core::EmitterKind;
use serde::Deserialize;
use tracing::debug;

pub const CONFIG_FILENAME: &str = "idlgen.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub generate: GenerateConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GenerateConfig {
    pub source: Option<PathBuf>,
    pub document: Option<PathBuf>,
    pub module: Option<String>,
    pub app: Option<String>,
    pub output: Option<PathBuf>,
    pub emit: Option<Vec<EmitterKind>>,
    pub force: Option<bool>,
    pub skip_existing: Option<bool>,
    pub strict: Option<bool>,
    pub formatter: Option<String>,
    /// Source file extensions, without the dot.
    pub extensions: Option<Vec<String>>,
}

impl ConfigFile {
    pub fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let mut config: ConfigFile =
            toml::from_str(contents).map_err(|err| format!("Failed to parse {}: {err}", path.display()))?;
        if let Some(base) = path.parent() {
            config.generate.rebase(base);
        }
        Ok(config)
    }
}

impl GenerateConfig {
    fn rebase(&mut self, base: &Path) {
        for path in [&mut self.source, &mut self.document, &mut self.output]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Read the config file.
///
/// An explicit path must exist. Without one, `idlgen.toml` in the working
/// directory is used when present and an empty config otherwise.
pub fn load(explicit: Option<&Path>) -> Result<ConfigFile, String> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(CONFIG_FILENAME);
            if !default.is_file() {
                debug!("No {CONFIG_FILENAME} found, using flags only.");
                return Ok(ConfigFile::default());
            }
            default
        }
    };
    let contents =
        fs::read_to_string(&path).map_err(|err| format!("Failed to read config file {}: {err}", path.display()))?;
    debug!(path = %path.display(), "Loaded config file.");
    ConfigFile::parse(&contents, &path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_generate_table() {
        let config = ConfigFile::parse(
            r#"
[generate]
source = "model"
module = "blog_api"
app = "blog"
output = "/abs/out"
emit = ["types", "client"]
skip-existing = true
formatter = "ruff format"
extensions = ["smithy", "idl"]
"#,
            Path::new("/project/idlgen.toml"),
        )
        .unwrap();
        let generate = config.generate;
        assert_eq!(generate.source, Some(PathBuf::from("/project/model")));
        assert_eq!(generate.output, Some(PathBuf::from("/abs/out")));
        assert_eq!(generate.module.as_deref(), Some("blog_api"));
        assert_eq!(generate.emit, Some(vec![EmitterKind::Types, EmitterKind::Client]));
        assert_eq!(generate.skip_existing, Some(true));
        assert_eq!(generate.force, None);
        assert_eq!(generate.extensions, Some(vec!["smithy".to_string(), "idl".to_string()]));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = ConfigFile::parse("[generate]\nmodul = \"x\"\n", Path::new("idlgen.toml")).unwrap_err();
        assert!(err.contains("idlgen.toml"));
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(ConfigFile::parse("", Path::new("idlgen.toml")).unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load(Some(&missing)).unwrap_err().contains("Failed to read config file"));

        let present = dir.path().join("custom.toml");
        fs::write(&present, "[generate]\napp = \"demo\"\n").unwrap();
        assert_eq!(load(Some(&present)).unwrap().generate.app.as_deref(), Some("demo"));
    }
}
