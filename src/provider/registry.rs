//! Provider registry: stable names mapped to constructors.
//!
//! The registry only builds providers. Ordering comes from the configured
//! priority list, so the chain is exactly the enabled names in config order.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::{ProviderSettings, ProvidersConfig};

use super::{
    ArxivProvider, OpenAccessButtonProvider, Provider, ProviderError, SciHubProvider,
    ScrapeProvider, ScrapeSite, SemanticScholarProvider, UnpaywallProvider,
};

/// Built-in provider names in default priority order.
pub const BUILTIN_PROVIDERS: [&str; 11] = [
    "unpaywall",
    "scihub",
    "semantic-scholar",
    "arxiv",
    "core",
    "open-access-button",
    "europe-pmc",
    "pubmed",
    "paperity",
    "google-scholar",
    "researchgate",
];

/// Builds a provider from its settings.
pub type ProviderConstructor =
    Box<dyn Fn(&ProviderSettings) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync>;

/// Name-keyed provider constructors.
pub struct ProviderRegistry {
    constructors: BTreeMap<String, ProviderConstructor>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("names", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry holding every built-in provider.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("unpaywall", |s| Ok(Arc::new(UnpaywallProvider::new(s))));
        registry.register("scihub", |s| Ok(Arc::new(SciHubProvider::new(s))));
        registry.register("semantic-scholar", |s| {
            Ok(Arc::new(SemanticScholarProvider::new(s)))
        });
        registry.register("arxiv", |_| Ok(Arc::new(ArxivProvider::new())));
        registry.register("open-access-button", |s| {
            Ok(Arc::new(OpenAccessButtonProvider::new(s)))
        });
        for site in [
            ScrapeSite::CORE,
            ScrapeSite::EUROPE_PMC,
            ScrapeSite::PUBMED,
            ScrapeSite::PAPERITY,
            ScrapeSite::GOOGLE_SCHOLAR,
            ScrapeSite::RESEARCHGATE,
        ] {
            registry.register(site.name, move |s| Ok(Arc::new(ScrapeProvider::new(site, s))));
        }
        registry
    }

    /// Registers (or replaces) the constructor for `name`.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&ProviderSettings) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync + 'static,
    {
        debug!(provider = name, "registering provider");
        self.constructors
            .insert(name.to_string(), Box::new(constructor));
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// True if `name` has a constructor.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Builds the provider named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] for unknown names or when the
    /// constructor fails.
    pub fn build(
        &self,
        name: &str,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ProviderError::unavailable(name, "no such provider"))?;
        constructor(settings)
    }

    /// Builds the enabled providers in priority order.
    ///
    /// Providers without their own `timeout_secs` get `request_timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns the first construction failure; a chain with a missing member
    /// would silently change the fallback order.
    pub fn build_chain(
        &self,
        config: &ProvidersConfig,
        request_timeout_secs: u64,
    ) -> Result<Vec<Arc<dyn Provider>>, ProviderError> {
        config
            .enabled()
            .into_iter()
            .map(|name| {
                let mut settings = config.settings_for(name);
                settings.timeout_secs.get_or_insert(request_timeout_secs);
                self.build(name, &settings)
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_cover_every_builtin_name() {
        let registry = ProviderRegistry::with_builtins();
        for name in BUILTIN_PROVIDERS {
            assert!(registry.contains(name), "missing {name}");
        }
        assert_eq!(registry.names().len(), BUILTIN_PROVIDERS.len());
    }

    #[test]
    fn test_built_provider_reports_its_registered_name() {
        let registry = ProviderRegistry::with_builtins();
        for name in BUILTIN_PROVIDERS {
            let provider = registry.build(name, &ProviderSettings::default()).unwrap();
            assert_eq!(provider.name(), name);
        }
    }

    #[test]
    fn test_build_chain_follows_priority_and_skips_disabled() {
        let mut config = ProvidersConfig {
            priority: vec![
                "pubmed".to_string(),
                "arxiv".to_string(),
                "unpaywall".to_string(),
            ],
            ..ProvidersConfig::default()
        };
        config.settings.insert(
            "arxiv".to_string(),
            ProviderSettings {
                enabled: false,
                ..ProviderSettings::default()
            },
        );
        let chain = ProviderRegistry::with_builtins().build_chain(&config, 30).unwrap();
        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["pubmed", "unpaywall"]);
    }

    #[test]
    fn test_build_chain_fills_missing_timeouts_from_request_timeout() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = ProviderRegistry::new();
        for name in ["first", "second"] {
            let seen = Arc::clone(&seen);
            registry.register(name, move |s| {
                seen.lock().unwrap().push(s.timeout_secs);
                Ok(Arc::new(ArxivProvider::new()))
            });
        }
        let mut config = ProvidersConfig {
            priority: vec!["first".to_string(), "second".to_string()],
            ..ProvidersConfig::default()
        };
        config.settings.insert(
            "second".to_string(),
            ProviderSettings {
                timeout_secs: Some(7),
                ..ProviderSettings::default()
            },
        );

        registry.build_chain(&config, 2).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(2), Some(7)]);
    }

    #[test]
    fn test_unknown_name_fails() {
        let err = ProviderRegistry::new()
            .build("libgen", &ProviderSettings::default())
            .err().unwrap();
        assert!(err.to_string().contains("libgen"), "{err}");
    }

    #[test]
    fn test_debug_lists_names() {
        let debug = format!("{:?}", ProviderRegistry::with_builtins());
        assert!(debug.contains("scihub"), "{debug}");
    }
}
