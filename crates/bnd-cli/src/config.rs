use anyhow::{bail, Context, Result};
use bnd_resolve::config::{default_cache_root, HttpConfig, RepositoryConfig, RunConfig};
use bnd_resolve::RepositoryManager;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "bnd.toml";

/// The workspace configuration file structure (bnd.toml)
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BndConfig {
    /// Root directory for downloaded indexes and artifacts
    pub cache_dir: Option<PathBuf>,

    /// HTTP connector settings
    pub http: HttpConfig,

    /// Repository plugins, in registration order
    #[serde(rename = "repository")]
    pub repositories: Vec<RepositoryConfig>,

    /// Run instructions used by `providers` and `mandatory`
    pub run: RunConfig,

    /// Directory containing the loaded file
    #[serde(skip)]
    base_dir: PathBuf,
}

impl BndConfig {
    /// Load configuration from bnd.toml, searching upward from the given directory
    pub fn load(start_dir: &Path) -> Result<Option<Self>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE);

            if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)
                    .with_context(|| format!("Failed to read {}", config_path.display()))?;
                let mut config: BndConfig = toml::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", config_path.display()))?;
                config.base_dir = current;
                return Ok(Some(config));
            }

            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Load the nearest bnd.toml, or an empty configuration rooted at `start_dir`
    pub fn load_or_default(start_dir: &Path) -> Result<Self> {
        Ok(Self::load(start_dir)?.unwrap_or_else(|| Self {
            base_dir: start_dir.to_path_buf(),
            ..Self::default()
        }))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn cache_root(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => self.base_dir.join(dir),
            None => default_cache_root(),
        }
    }

    /// Instantiate every configured repository, in declaration order.
    pub fn repository_manager(&self) -> Result<RepositoryManager> {
        let mut seen = HashSet::new();
        for repository in &self.repositories {
            if !seen.insert(repository.name()) {
                bail!("Repository name \"{}\" is declared twice", repository.name());
            }
        }

        let connector = self.http.connector().context("Failed to create HTTP client")?;
        let cache_root = self.cache_root();
        let mut manager = RepositoryManager::new();
        for repository in &self.repositories {
            let built = repository
                .build(&self.base_dir, &cache_root, connector.clone())
                .with_context(|| format!("Failed to set up repository {}", repository.name()))?;
            manager.add_repository(built);
        }
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bnd_resolve::config::BlacklistConfig;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty_config() {
        let config: BndConfig = toml::from_str("").unwrap();
        assert!(config.repositories.is_empty());
        assert!(config.run.framework.is_none());
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_parse_repositories_and_run() {
        let toml = r#"
cache-dir = ".cache"

[http]
timeout = 5
max-retries = 1

[[repository]]
type = "indexed"
name = "central"
locations = ["https://repo.example.com/index.json.gz"]
content = "R5|OBR"
index-caching = "prefer-cache"

[[repository]]
type = "local"
name = "release"
storage = "release"

[run]
framework = { bsn = "org.apache.felix.framework", version = "[6,7)" }
ee = "JavaSE-11"
repositories = ["release", "central"]
blacklist = ["org.osgi.core", { namespace = "osgi.wiring.package", filter = "(osgi.wiring.package=bad)" }]
preferences = ["org.example.impl;version=2"]

[run.effective.active]
skip = ["osgi.extender"]
"#;
        let config: BndConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.http.timeout, 5);
        assert_eq!(config.http.max_retries, 1);
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories[0].name(), "central");
        assert_eq!(config.repositories[1].name(), "release");

        let framework = config.run.framework.as_ref().unwrap();
        assert_eq!(framework.bsn, "org.apache.felix.framework");
        assert_eq!(framework.version.as_deref(), Some("[6,7)"));
        assert_eq!(config.run.ee.as_deref(), Some("JavaSE-11"));
        assert_eq!(config.run.repositories, Some(vec!["release".to_string(), "central".to_string()]));
        assert!(matches!(config.run.blacklist[0], BlacklistConfig::Identity(_)));
        assert!(matches!(config.run.blacklist[1], BlacklistConfig::Requirement(_)));
        assert_eq!(config.run.effective["active"].skip, vec!["osgi.extender"]);
    }

    #[test]
    fn test_load_searches_upward() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "cache-dir = \"cache\"\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = BndConfig::load(&nested).unwrap().unwrap();
        assert_eq!(config.base_dir(), dir.path());
        assert_eq!(config.cache_root(), dir.path().join("cache"));
    }

    #[test]
    fn test_load_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = BndConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.base_dir(), dir.path());
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn test_duplicate_repository_names() {
        let toml = r#"
[[repository]]
type = "local"
name = "same"
storage = "a"

[[repository]]
type = "local"
name = "same"
storage = "b"
"#;
        let config: BndConfig = toml::from_str(toml).unwrap();
        let err = config.repository_manager().err().unwrap();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_local_repository_manager() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[[repository]]\ntype = \"local\"\nname = \"release\"\nstorage = \"release\"\n",
        )
        .unwrap();

        let config = BndConfig::load(dir.path()).unwrap().unwrap();
        let manager = config.repository_manager().unwrap();
        assert_eq!(manager.len(), 1);
        assert!(manager.get("release").unwrap().can_write());
        assert!(dir.path().join("release").is_dir());
    }
}
