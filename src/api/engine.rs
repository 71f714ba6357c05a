//! Main resolution engine.
//!
//! Runs the whole pipeline for one workspace:
//! scan → discover → check for cycles → flatten.

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::config::ResolverConfig;
use crate::core::errors::Result;
use crate::core::home::SelefraHome;
use crate::modules::cycles::check_acyclic;
use crate::modules::discovery::GraphDiscovery;
use crate::modules::flatten::{flatten, MergedModule, ModuleManifest};
use crate::modules::graph::ResolvedGraph;
use crate::modules::resolver::ReferenceResolver;
use crate::modules::scanner::WorkspaceScanner;
use crate::registry::{HttpPackageFetcher, HttpVersionRegistry, PackageFetcher, VersionRegistry};

/// Module declaration graph resolver
pub struct ModuleEngine {
    config: Arc<ResolverConfig>,
    home: SelefraHome,
    token: Option<String>,
    fetcher: Arc<dyn PackageFetcher>,
    registry: Arc<dyn VersionRegistry>,
}

impl ModuleEngine {
    /// Create an engine talking to the configured HTTP registry
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpPackageFetcher::new(&config.registry)?);
        let registry = Arc::new(HttpVersionRegistry::new(&config.registry)?);
        Self::with_collaborators(config, fetcher, registry)
    }

    /// Create an engine with explicit fetch and registry collaborators
    pub fn with_collaborators(
        config: ResolverConfig,
        fetcher: Arc<dyn PackageFetcher>,
        registry: Arc<dyn VersionRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let home = SelefraHome::open(config.home_dir()?)?;

        let token = match &config.token {
            Some(token) => Some(token.clone()),
            None => home.credentials_token().unwrap_or_else(|err| {
                warn!("Ignoring unreadable credentials: {}", err);
                None
            }),
        };

        Ok(Self {
            config: Arc::new(config),
            home,
            token,
            fetcher,
            registry,
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Home directory layout in use
    pub fn home(&self) -> &SelefraHome {
        &self.home
    }

    /// Whether organization packages can be fetched
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Scan the workspace and follow every reference.
    ///
    /// The returned graph has not been checked for cycles.
    pub async fn discover(&self) -> Result<ResolvedGraph> {
        let scanner = WorkspaceScanner::new(&self.config)?;
        let seeds = scanner.scan(&self.config.workspace)?;

        let resolver = ReferenceResolver::new(
            self.home.clone(),
            self.token.clone(),
            self.fetcher.clone(),
            self.registry.clone(),
        );
        GraphDiscovery::new(
            resolver,
            self.config.extension.clone(),
            self.config.registry.org_host.clone(),
        )
        .discover(seeds)
        .await
    }

    /// Resolve the workspace into the flattened module list
    pub async fn resolve(&self) -> Result<Vec<MergedModule>> {
        info!("Resolving modules in {}", self.config.workspace.display());
        let graph = self.discover().await?;
        check_acyclic(&graph)?;
        let modules = flatten(&graph)?;
        info!("Resolved {} modules", modules.len());
        Ok(modules)
    }

    /// Resolve and render the `modules:` YAML consumed by the rule loader
    pub async fn render_yaml(&self) -> Result<String> {
        let modules = self.resolve().await?;
        ModuleManifest { modules }.to_yaml()
    }
}
