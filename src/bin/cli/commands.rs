//! Command Execution Logic
//!
//! Runs the resolver commands and renders their console output.

use crate::cli::args::*;
use anyhow::{bail, Context};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style as TableStyle, Table, Tabled};
use tracing::info;
use selefra_modules::modules::flatten::child_documents;
use selefra_modules::{ModuleEngine, ResolverConfig};

/// Resolve the workspace and print or save the module list
pub async fn resolve_command(args: ResolveArgs) -> anyhow::Result<()> {
    let config = build_configuration(&args.workspace)?;
    let engine = ModuleEngine::new(config)?;
    let yaml = engine.render_yaml().await?;

    match &args.out {
        Some(out) => {
            tokio::fs::write(out, &yaml)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!(
                "{} {}",
                "✅ Module list written to:".bright_green().bold(),
                out.display().to_string().cyan()
            );
        }
        None => print!("{yaml}"),
    }

    Ok(())
}

/// List discovered documents and whether each one is a root or inlined
pub async fn documents_command(args: WorkspaceArgs) -> anyhow::Result<()> {
    let config = build_configuration(&args)?;
    let workspace = std::fs::canonicalize(&config.workspace)
        .with_context(|| format!("Workspace does not exist: {}", config.workspace.display()))?;
    let engine = ModuleEngine::new(config)?;
    let graph = engine.discover().await?;
    let children = child_documents(&graph);

    #[derive(Tabled)]
    struct DocumentRow {
        document: String,
        role: String,
        modules: usize,
        references: usize,
    }

    let rows: Vec<DocumentRow> = graph
        .documents()
        .map(|document| DocumentRow {
            document: display_relative(&document.path, &workspace),
            role: if children.contains(document.path.as_path()) {
                "inlined".to_string()
            } else {
                "root".to_string()
            },
            modules: document.declarations.len(),
            references: document.declarations.iter().map(|d| d.uses.len()).sum(),
        })
        .collect();

    println!("{}", "📄 Module Documents".bright_blue().bold());
    println!(
        "   Found {} documents ({} roots)",
        rows.len(),
        rows.len() - children.len()
    );
    println!();

    if rows.is_empty() {
        println!("{}", "No module documents found.".dimmed());
        return Ok(());
    }

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);

    Ok(())
}

/// Print default configuration in YAML format
pub async fn print_default_config() -> anyhow::Result<()> {
    println!("{}", "# Default selefra-modules configuration".dimmed());
    println!("{}", "# Save this to a file and customize as needed".dimmed());
    println!("{}", "# Usage: selefra-modules resolve --config your-config.yml".dimmed());
    println!();

    let yaml_output = serde_yaml::to_string(&ResolverConfig::default())?;
    println!("{}", yaml_output);

    Ok(())
}

/// Initialize a configuration file with defaults
pub async fn init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        eprintln!("{} {}", "❌ Configuration file already exists:".red(), args.output.display());
        eprintln!("   Use --force to overwrite or choose a different name with --output");
        bail!("refusing to overwrite {}", args.output.display());
    }

    ResolverConfig::default().to_yaml_file(&args.output)?;

    println!(
        "{} {}",
        "✅ Configuration saved to:".bright_green().bold(),
        args.output.display().to_string().cyan()
    );
    println!();
    println!("{}", "📝 Next steps:".bright_blue().bold());
    println!("   1. Point `workspace` at your policy directory");
    println!(
        "   2. Run: {}",
        format!("selefra-modules resolve --config {}", args.output.display()).cyan()
    );
    println!();
    println!("{}", "🔧 Key settings you can customize:".bright_blue().bold());

    #[derive(Tabled)]
    struct CustomizationRow {
        setting: String,
        description: String,
    }

    let customization_rows = vec![
        CustomizationRow {
            setting: "workspace".to_string(),
            description: "Directory scanned for module documents".to_string(),
        },
        CustomizationRow {
            setting: "home".to_string(),
            description: "Package cache and credentials (default ~/.selefra)".to_string(),
        },
        CustomizationRow {
            setting: "exclude_patterns".to_string(),
            description: "Globs skipped while scanning".to_string(),
        },
        CustomizationRow {
            setting: "registry.metadata_url".to_string(),
            description: "Public module registry".to_string(),
        },
    ];

    let mut table = Table::new(customization_rows);
    table.with(TableStyle::rounded());
    println!("{}", table);

    Ok(())
}

/// Validate a configuration file
pub async fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    println!(
        "{} {}",
        "🔍 Validating configuration:".bright_blue().bold(),
        args.config.display().to_string().cyan()
    );
    println!();

    let config = match load_configuration(Some(&args.config)) {
        Ok(config) => {
            println!("{}", "✅ Configuration file is valid!".bright_green().bold());
            println!();
            config
        }
        Err(e) => {
            eprintln!("{} {:#}", "❌ Configuration validation failed:".red(), e);
            println!();
            println!("{}", "🔧 Common issues:".bright_blue().bold());
            println!("   • Check YAML syntax (indentation, colons, quotes)");
            println!("   • `extension` is written without the leading dot");
            println!("   • Exclude patterns must be valid globs");
            println!();
            println!(
                "{}",
                "💡 Tip: Use 'selefra-modules print-default-config' to see valid format".dimmed()
            );
            return Err(e);
        }
    };

    #[derive(Tabled)]
    struct DetailRow {
        setting: String,
        value: String,
    }

    let home = config
        .home_dir()
        .map(|home| home.display().to_string())
        .unwrap_or_else(|_| "(unresolved)".to_string());
    let detail_rows = vec![
        DetailRow {
            setting: "Workspace".to_string(),
            value: config.workspace.display().to_string(),
        },
        DetailRow {
            setting: "Home".to_string(),
            value: home,
        },
        DetailRow {
            setting: "Extension".to_string(),
            value: config.extension.clone(),
        },
        DetailRow {
            setting: "Exclude Patterns".to_string(),
            value: config.exclude_patterns.join(", "),
        },
        DetailRow {
            setting: "Registry".to_string(),
            value: config.registry.metadata_url.clone(),
        },
        DetailRow {
            setting: "Organization Host".to_string(),
            value: config.registry.org_host.clone(),
        },
    ];

    let mut table = Table::new(detail_rows);
    table.with(TableStyle::rounded());
    println!("{}", table);

    Ok(())
}

/// Load a configuration file, or the defaults when none is given.
///
/// A relative workspace in a file is taken relative to that file.
pub fn load_configuration(config_path: Option<&Path>) -> anyhow::Result<ResolverConfig> {
    let mut config = match config_path {
        Some(path) => {
            let mut config = ResolverConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            if config.workspace.is_relative() {
                let base = path.parent().unwrap_or_else(|| Path::new(""));
                config.workspace = base.join(&config.workspace);
            }
            config
        }
        None => ResolverConfig::default(),
    };

    if config.workspace.as_os_str().is_empty() {
        config.workspace = PathBuf::from(".");
    }
    config.validate()?;
    Ok(config)
}

/// Merge command-line overrides into the loaded configuration
fn build_configuration(args: &WorkspaceArgs) -> anyhow::Result<ResolverConfig> {
    let mut config = load_configuration(args.config.as_deref())?;

    if let Some(workspace) = &args.workspace {
        config.workspace = workspace.clone();
    }
    if let Some(token) = &args.token {
        config.token = Some(token.clone());
    }

    info!("Using workspace {}", config.workspace.display());
    Ok(config)
}

fn display_relative(path: &Path, workspace: &Path) -> String {
    path.strip_prefix(workspace)
        .map(|relative| relative.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}
