use serde::{de::Visitor, Deserialize};
use std::{
    net::SocketAddr,
    ops::Deref,
    path::{Path, PathBuf},
};
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Deserialize, Debug)]
pub struct StoreConfig {
    pub data_file: ValidPath,
}

#[derive(Deserialize, Debug)]
pub struct NetConfig {
    pub proto_host: Url,
    pub bind: SocketAddr,
    /// Editor assets served at `/`.
    #[serde(default)]
    pub static_dir: Option<ValidPath>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SectionConfig {
    pub label: String,
    pub key: String,
    /// Also publish this section as the site root.
    #[serde(default)]
    pub index: bool,
}

#[derive(Deserialize, Debug)]
pub struct SiteConfig {
    pub out_dir: PathBuf,
    pub title: String,
    pub base_url: Url,
    /// Holds `<key>/<key>.html` fragments for static sections.
    #[serde(default)]
    pub content_dir: Option<ValidPath>,
    #[serde(default)]
    pub sections: Vec<SectionConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub store: StoreConfig,
    pub net: NetConfig,
    pub site: Option<SiteConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(toml::from_str(&raw)?)
    }
}

/// A path that existed when the config was loaded, stored canonicalized.
#[derive(Debug)]
pub struct ValidPath(PathBuf);

impl<'de> Deserialize<'de> for ValidPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ValidPathVisitor;
        impl Visitor<'_> for ValidPathVisitor {
            type Value = ValidPath;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "a path to an existing file or directory")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ValidPath(
                    PathBuf::from(v)
                        .canonicalize()
                        .map_err(|err| E::custom(format!("{}: {}", v, err)))?,
                ))
            }
        }

        deserializer.deserialize_str(ValidPathVisitor)
    }
}

impl Deref for ValidPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.0.as_path()
    }
}
