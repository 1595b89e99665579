//! Structured configuration for repositories, HTTP access and resolve runs.
//!
//! These types deserialize from TOML (or any serde format) with kebab-case
//! keys:
//!
//! ```toml
//! [http]
//! timeout = 60
//!
//! [[repository]]
//! type = "indexed"
//! name = "central"
//! locations = ["https://example.org/index.json.gz"]
//!
//! [run]
//! ee = "JavaSE-1.8"
//! framework = { bsn = "org.apache.felix.framework", version = "[4,5)" }
//! preferences = ["org.apache.felix.scr"]
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use url::Url;

use crate::cache::CachingMode;
use crate::error::{BndError, Result};
use crate::http::{HttpConnector, HttpConnectorConfig, UrlConnector};
use crate::repository::content::ContentProvider;
use crate::repository::{IndexedRepository, LocalIndexedRepository, Repository};
use crate::resource::{AttrValue, Capability, Requirement};

const CACHE_DIR_ENV: &str = "BND_CACHE_DIR";

/// The cache root: `BND_CACHE_DIR`, else the platform cache directory.
pub fn default_cache_root() -> PathBuf {
    if let Some(dir) = env::var(CACHE_DIR_ENV).ok().filter(|s| !s.is_empty()) {
        return PathBuf::from(dir);
    }
    match directories::ProjectDirs::from("", "", "bnd") {
        Some(dirs) => dirs.cache_dir().to_path_buf(),
        None => PathBuf::from(".bnd").join("cache"),
    }
}

/// Settings for the default HTTP connector
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout: u64,
    /// Connect timeout in seconds
    pub connect_timeout: u64,
    pub max_retries: u32,
    /// Initial retry delay in milliseconds, doubled on every attempt
    pub retry_delay: u64,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let defaults = HttpConnectorConfig::default();
        Self {
            timeout: defaults.timeout.as_secs(),
            connect_timeout: defaults.connect_timeout.as_secs(),
            max_retries: defaults.max_retries,
            retry_delay: defaults.retry_delay.as_millis() as u64,
            user_agent: None,
            proxy: None,
        }
    }
}

impl HttpConfig {
    pub fn connector_config(&self) -> HttpConnectorConfig {
        let defaults = HttpConnectorConfig::default();
        HttpConnectorConfig {
            timeout: Duration::from_secs(self.timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay),
            proxy: self.proxy.clone(),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }

    pub fn connector(&self) -> Result<Arc<dyn UrlConnector>> {
        Ok(Arc::new(HttpConnector::with_config(self.connector_config())?))
    }
}

/// Caching policy for index documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexCaching {
    PreferCache,
    #[default]
    PreferRemote,
}

impl From<IndexCaching> for CachingMode {
    fn from(value: IndexCaching) -> Self {
        match value {
            IndexCaching::PreferCache => CachingMode::PreferCache,
            IndexCaching::PreferRemote => CachingMode::PreferRemote,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexedRepositoryConfig {
    pub name: String,
    /// Index URLs, or paths relative to the configuration file
    pub locations: Vec<String>,
    /// Content provider names separated by `|`, e.g. `R5|OBR`
    #[serde(default)]
    pub content: Option<String>,
    /// Defaults to `<cache root>/<name>`
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub index_caching: IndexCaching,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocalRepositoryConfig {
    pub name: String,
    /// Storage directory, relative to the configuration file
    pub storage: PathBuf,
}

/// A repository plugin declaration
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RepositoryConfig {
    Indexed(IndexedRepositoryConfig),
    Local(LocalRepositoryConfig),
}

impl RepositoryConfig {
    pub fn name(&self) -> &str {
        match self {
            RepositoryConfig::Indexed(config) => &config.name,
            RepositoryConfig::Local(config) => &config.name,
        }
    }

    /// Instantiate the repository. Relative paths resolve against `base_dir`.
    pub fn build(
        &self,
        base_dir: &Path,
        cache_root: &Path,
        connector: Arc<dyn UrlConnector>,
    ) -> Result<Arc<dyn Repository>> {
        match self {
            RepositoryConfig::Indexed(config) => {
                let locations = config
                    .locations
                    .iter()
                    .map(|location| location_url(base_dir, location))
                    .collect::<Result<Vec<_>>>()?;
                let providers = match &config.content {
                    Some(names) => ContentProvider::parse_list(names)?,
                    None => vec![ContentProvider::R5],
                };
                let cache_dir = config
                    .cache_dir
                    .as_ref()
                    .map(|dir| base_dir.join(dir))
                    .unwrap_or_else(|| cache_root.join(&config.name));

                Ok(Arc::new(
                    IndexedRepository::new(config.name.clone(), locations, connector)
                        .with_cache_dir(cache_dir)
                        .with_content_providers(providers)
                        .with_index_caching_mode(config.index_caching.into()),
                ))
            }
            RepositoryConfig::Local(config) => Ok(Arc::new(LocalIndexedRepository::open(
                config.name.clone(),
                base_dir.join(&config.storage),
            )?)),
        }
    }
}

/// An index location: an absolute URL or a filesystem path.
fn location_url(base_dir: &Path, location: &str) -> Result<Url> {
    match Url::parse(location) {
        // Single letter schemes are Windows drive letters
        Ok(url) if url.scheme().len() > 1 => Ok(url),
        _ => {
            let path = base_dir.join(location);
            Url::from_file_path(&path)
                .map_err(|_| BndError::Config(format!("invalid index location {}", path.display())))
        }
    }
}

/// `bsn` plus an optional version or range
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub bsn: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// A capability. Attribute keys may carry a type, as in `version:Version`.
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilityConfig {
    pub namespace: String,
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
    #[serde(default)]
    pub directives: IndexMap<String, String>,
}

impl CapabilityConfig {
    pub fn to_capability(&self) -> Result<Capability> {
        let mut capability = Capability::new(&self.namespace);
        for (key, raw) in &self.attributes {
            let (name, value) = match key.split_once(':') {
                Some((name, type_name)) => {
                    let value = AttrValue::parse_typed(type_name, raw).ok_or_else(|| {
                        BndError::Config(format!("invalid {} value \"{}\" for {}", type_name, raw, name))
                    })?;
                    (name, value)
                }
                None => (key.as_str(), AttrValue::from(raw.as_str())),
            };
            capability = capability.with_attribute(name.trim(), value);
        }
        for (key, value) in &self.directives {
            capability = capability.with_directive(key.clone(), value.clone());
        }
        Ok(capability)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequirementConfig {
    pub namespace: String,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub directives: IndexMap<String, String>,
}

impl RequirementConfig {
    /// Build the requirement, rejecting malformed filters.
    pub fn to_requirement(&self) -> Result<Requirement> {
        let mut requirement = match &self.filter {
            Some(filter) => Requirement::with_filter(&self.namespace, filter)?,
            None => Requirement::new(&self.namespace),
        };
        for (key, value) in &self.directives {
            requirement = requirement.with_directive(key.clone(), value.clone());
        }
        Ok(requirement)
    }
}

/// A blacklist entry: `bsn;version=...` or a requirement
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BlacklistConfig {
    Identity(String),
    Requirement(RequirementConfig),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EffectiveConfig {
    /// Namespaces for which this effective value stays disabled
    pub skip: Vec<String>,
}

/// Instructions for one resolve run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunConfig {
    /// The framework; bsn `none` disables framework selection
    pub framework: Option<IdentityConfig>,
    /// Execution environment name, `JavaSE-1.6` when absent
    pub ee: Option<String>,
    /// Repository names in priority order; all repositories when absent
    pub repositories: Option<Vec<String>>,
    pub blacklist: Vec<BlacklistConfig>,
    /// `bsn` or `bsn;version=range`, highest priority first
    pub preferences: Vec<String>,
    /// Effective directive values to enable besides `resolve`
    pub effective: IndexMap<String, EffectiveConfig>,
    pub system_packages: Vec<PackageConfig>,
    pub system_capabilities: Vec<CapabilityConfig>,
    pub provided_capabilities: Vec<CapabilityConfig>,
    pub requires: Vec<RequirementConfig>,
    /// Resources whose optional requirements are resolved against repositories
    pub optional_roots: Vec<IdentityConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace;
    use bnd_version::Version;

    #[derive(Deserialize)]
    struct File {
        #[serde(default)]
        http: HttpConfig,
        #[serde(default, rename = "repository")]
        repositories: Vec<RepositoryConfig>,
        #[serde(default)]
        run: RunConfig,
    }

    #[test]
    fn test_parse_full_configuration() {
        let toml = r#"
[http]
timeout = 5
max-retries = 1

[[repository]]
type = "indexed"
name = "central"
locations = ["https://repo.example.org/index.json", "local/index.json"]
content = "R5|OBR"
index-caching = "prefer-cache"

[[repository]]
type = "local"
name = "release"
storage = "release"

[run]
ee = "JavaSE-1.8"
framework = { bsn = "org.apache.felix.framework", version = "[4,5)" }
repositories = ["release", "central"]
blacklist = ["org.bad;version=1.0.0", { namespace = "osgi.wiring.package", filter = "(osgi.wiring.package=org.bad)" }]
preferences = ["org.apache.felix.scr"]
system-packages = [{ name = "sun.misc" }]

[run.effective.active]
skip = ["osgi.service"]

[[run.system-capabilities]]
namespace = "osgi.native"
attributes = { "osgi.native.osname" = "Linux", "version:Version" = "5.0" }

[[run.requires]]
namespace = "osgi.identity"
filter = "(osgi.identity=org.example.app)"
"#;
        let file: File = toml::from_str(toml).unwrap();
        assert_eq!(file.http.timeout, 5);
        assert_eq!(file.http.max_retries, 1);
        assert_eq!(file.repositories.len(), 2);
        assert_eq!(file.repositories[1].name(), "release");
        match &file.repositories[0] {
            RepositoryConfig::Indexed(config) => {
                assert_eq!(config.index_caching, IndexCaching::PreferCache);
                assert_eq!(config.content.as_deref(), Some("R5|OBR"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let run = file.run;
        assert_eq!(run.ee.as_deref(), Some("JavaSE-1.8"));
        assert_eq!(run.framework.unwrap().bsn, "org.apache.felix.framework");
        assert!(matches!(run.blacklist[0], BlacklistConfig::Identity(_)));
        assert!(matches!(run.blacklist[1], BlacklistConfig::Requirement(_)));
        assert_eq!(run.effective["active"].skip, vec!["osgi.service"]);

        let native = run.system_capabilities[0].to_capability().unwrap();
        assert_eq!(native.attribute("version"), Some(&AttrValue::Version(Version::new(5, 0, 0))));
        assert_eq!(native.attribute("osgi.native.osname"), Some(&AttrValue::from("Linux")));

        let requirement = run.requires[0].to_requirement().unwrap();
        assert_eq!(requirement.namespace(), namespace::IDENTITY);
    }

    #[test]
    fn test_http_section_maps_onto_connector() {
        let http: HttpConfig = toml::from_str(
            r#"
timeout = 7
connect-timeout = 2
max-retries = 5
retry-delay = 250
proxy = "http://proxy.local:3128"
"#,
        )
        .unwrap();
        let config = http.connector_config();
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.proxy.as_deref(), Some("http://proxy.local:3128"));
        assert_eq!(config.user_agent, HttpConnectorConfig::default().user_agent);

        let agent = HttpConfig {
            user_agent: Some("bndx-test".into()),
            ..HttpConfig::default()
        };
        assert_eq!(agent.connector_config().user_agent, "bndx-test");
    }

    #[test]
    fn test_invalid_typed_attribute() {
        let config = CapabilityConfig {
            namespace: "x".into(),
            attributes: [("version:Version".to_string(), "not.a.version".to_string())]
                .into_iter()
                .collect(),
            directives: IndexMap::new(),
        };
        assert!(matches!(config.to_capability(), Err(BndError::Config(_))));
    }

    #[test]
    fn test_invalid_filter_is_a_config_error() {
        let config = RequirementConfig {
            namespace: "x".into(),
            filter: Some("(broken".into()),
            directives: IndexMap::new(),
        };
        assert!(matches!(config.to_requirement(), Err(BndError::Filter(_))));
    }

    #[test]
    fn test_location_url() {
        let base = std::env::temp_dir();
        let remote = location_url(&base, "https://example.org/index.json").unwrap();
        assert_eq!(remote.scheme(), "https");
        let local = location_url(&base, "repo/index.json").unwrap();
        assert_eq!(local.scheme(), "file");
        assert!(local.path().ends_with("repo/index.json"));
    }

    #[test]
    fn test_build_local_repository() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = RepositoryConfig::Local(LocalRepositoryConfig {
            name: "release".into(),
            storage: PathBuf::from("release"),
        });
        let repository = config
            .build(dir.path(), dir.path(), Arc::new(crate::http::OfflineConnector))
            .unwrap();
        assert!(repository.can_write());
        assert!(dir.path().join("release").is_dir());
    }
}
