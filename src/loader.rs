//! Declaration manifest loading from files, strings and HTTP URLs.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::LoadError;
use crate::source::DeclarationSource;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Text encoding of a manifest or document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Pick the format from a path or URL extension; JSON unless `.yaml`/`.yml`.
    pub fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            Format::Yaml
        } else {
            Format::Json
        }
    }
}

/// Load a declaration manifest from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist, or a parse
/// error if the content doesn't describe a declaration source.
pub fn load_source(path: &Path) -> Result<DeclarationSource, LoadError> {
    read_file(path)
}

/// Load a declaration manifest from a string.
pub fn load_source_str(content: &str, format: Format) -> Result<DeclarationSource, LoadError> {
    parse_str(content, format)
}

/// Load a declaration manifest from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
pub fn load_source_url(url: &str) -> Result<DeclarationSource, LoadError> {
    let network_error = |source: reqwest::Error| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network_error)?;

    let body = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .map_err(network_error)?;

    parse_str(&body, Format::from_path(url))
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a declaration manifest from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_source_auto(source: &str) -> Result<DeclarationSource, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_source_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_source(Path::new(source))
    }
}

/// Load any JSON or YAML file as an untyped value, e.g. an OpenAPI document
/// to validate.
pub fn load_value(path: &Path) -> Result<serde_json::Value, LoadError> {
    read_file(path)
}

pub(crate) fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    parse_str(&content, Format::from_path(&path.to_string_lossy()))
}

pub(crate) fn parse_str<T: DeserializeOwned>(content: &str, format: Format) -> Result<T, LoadError> {
    match format {
        Format::Json => {
            serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
        }
        Format::Yaml => {
            serde_yaml::from_str(content).map_err(|source| LoadError::InvalidYaml { source })
        }
    }
}
