use crate::annotations::{AnnotationSet, FrameworkAnnotation};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Replacement spelling lists, one optional entry per annotation.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SpellingOverrides {
    pub entity: Option<Vec<String>>,
    pub database: Option<Vec<String>>,
    pub dao: Option<Vec<String>>,
    pub column_info: Option<Vec<String>>,
    pub embedded: Option<Vec<String>>,
    pub ignore: Option<Vec<String>>,
}

impl SpellingOverrides {
    fn entries(&self) -> [(&'static str, &Option<Vec<String>>); 6] {
        [
            ("entity", &self.entity),
            ("database", &self.database),
            ("dao", &self.dao),
            ("column_info", &self.column_info),
            ("embedded", &self.embedded),
            ("ignore", &self.ignore),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Rebuilds attempted per query when the code model moves mid-build
    pub max_build_attempts: u32,
    pub spellings: SpellingOverrides,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_build_attempts: 3,
            spellings: SpellingOverrides::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_build_attempts == 0 {
            return Err(Error::Config("max_build_attempts must be at least 1".to_string()));
        }
        for (name, spellings) in self.spellings.entries() {
            if let Some(list) = spellings {
                if list.is_empty() || list.iter().any(|s| s.trim().is_empty()) {
                    return Err(Error::Config(format!("spellings.{} must list qualified names", name)));
                }
            }
        }

        let annotations = AnnotationSet::from_overrides(&self.spellings);
        for &annotation in FrameworkAnnotation::all() {
            for spelling in annotations.spellings(annotation) {
                match annotations.identify(spelling) {
                    Some(owner) if owner != annotation => {
                        return Err(Error::Config(format!(
                            "{} is listed for both {} and {}",
                            spelling, owner, annotation
                        )));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("room-schema.toml")
}

pub fn parse_config(contents: &str) -> anyhow::Result<EngineConfig> {
    let config: EngineConfig = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<EngineConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    parse_config(&contents).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = parse_config("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_build_attempts, 3);
    }

    #[test]
    fn test_parse_overrides() {
        let config = parse_config(
            r#"
            max_build_attempts = 5

            [spellings]
            entity = ["com.fork.room.Entity", "androidx.room.Entity"]
            "#,
        )
        .unwrap();
        assert_eq!(config.max_build_attempts, 5);
        assert_eq!(config.spellings.entity.as_ref().map(Vec::len), Some(2));
        assert!(config.spellings.dao.is_none());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(parse_config("max_build_attempts = 0").is_err());
        assert!(parse_config("[spellings]\ndao = []").is_err());
        assert!(parse_config("max_build_attempts = \"many\"").is_err());
    }

    #[test]
    fn test_rejects_spelling_shared_by_two_annotations() {
        let err = parse_config("[spellings]\ndao = [\"androidx.room.Entity\"]").unwrap_err();
        assert!(err.to_string().contains("androidx.room.Entity is listed for both @Entity and @Dao"));

        let config = parse_config("[spellings]\ndao = [\"com.fork.room.Dao\"]").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_none() {
        let path = std::env::temp_dir().join("room-schema-does-not-exist.toml");
        assert!(load_config(Some(&path)).unwrap().is_none());
    }
}
