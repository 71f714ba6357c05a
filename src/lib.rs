//! # selefra-modules: Module Declaration Graph Resolver
//!
//! Resolves the `modules:` declarations scattered across a policy workspace
//! into the single ordered, uniquely named module list consumed by the rule
//! loader. Resolution:
//!
//! - **Scans** the workspace for documents carrying a `modules` section
//! - **Resolves** local paths, public registry packages (`selefra/<name>`)
//!   and organization packages (`app.selefra.io/<org>/<name>`), fetching
//!   remote packages into the `~/.selefra` cache
//! - **Expands** directory references into one declaration per document
//! - **Detects** circular references between documents
//! - **Flattens** nested documents under dot-qualified names
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    ModuleEngine (api)                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Scanner → Discovery → Cycle Detector → Flattener            │
//! │              │                                               │
//! │   Resolver + Expander ── registry (fetch, latest version)    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  core: errors · config · home cache                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use selefra_modules::{ModuleEngine, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ModuleEngine::new(ResolverConfig::for_workspace("./policies"))?;
//!     let modules = engine.resolve().await?;
//!
//!     for module in &modules {
//!         println!("{}: {:?}", module.name, module.uses);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Shared infrastructure
pub mod core {
    //! Errors, configuration and the per-user home layout.

    pub mod config;
    pub mod errors;
    pub mod home;
}

// Resolution pipeline
pub mod modules {
    //! Documents, references and the resolution stages.

    pub mod cycles;
    pub mod discovery;
    pub mod document;
    pub mod expander;
    pub mod flatten;
    pub mod graph;
    pub mod reference;
    pub mod resolver;
    pub mod scanner;
}

// Remote package collaborators
pub mod registry;

// Public API and engine interface
pub mod api {
    //! High-level engine interface.

    pub mod engine;
}

// Re-export primary types for convenience
pub use api::engine::ModuleEngine;
pub use core::config::{RegistryConfig, ResolverConfig};
pub use core::errors::{ModuleError, Result};
pub use modules::flatten::{MergedModule, ModuleManifest};
pub use modules::graph::ResolvedGraph;
pub use registry::{FetchRequest, PackageFetcher, VersionRegistry};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
