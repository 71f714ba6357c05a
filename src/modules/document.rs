//! Module documents.
//!
//! A document is any configuration file whose top-level mapping carries a
//! `modules` section:
//!
//! ```yaml
//! modules:
//!   - name: aws
//!     uses:
//!       - ./rules/aws
//!       - selefra/aws_misconfigure
//! ```
//!
//! Loading happens in two steps. [`RawModuleDocument::read`] checks the YAML
//! shape, then [`RawModuleDocument::classify`] turns every `uses` string into
//! a [`Reference`]. The scanner tolerates failures of the first step but not
//! of the second.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::core::config::MODULES_SECTION;
use crate::core::errors::{IoResultExt, ModuleError, Result};
use crate::modules::reference::Reference;

/// One `modules` entry exactly as written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawModule {
    /// Module name, unique within its document
    pub name: String,
    /// Raw reference strings
    #[serde(default)]
    pub uses: Vec<String>,
    /// Rule inputs, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

/// A file whose `modules` section parsed, before reference classification
#[derive(Debug, Clone, PartialEq)]
pub struct RawModuleDocument {
    /// Document path
    pub path: PathBuf,
    /// Entries in declaration order
    pub modules: Vec<RawModule>,
}

impl RawModuleDocument {
    /// Read a file and extract its `modules` section.
    ///
    /// Returns `Ok(None)` when the file is valid YAML without a `modules`
    /// section (a rule file, a provider file, an empty file).
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let content =
            fs::read_to_string(path).io_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(path, &content)
    }

    /// Parse document content already in memory.
    ///
    /// Only the first YAML document of a multi-document stream is read. Content
    /// that fails to parse is a malformed module document only when it mentions
    /// a `modules:` section; anything else is left to the rule loader.
    pub fn parse(path: &Path, content: &str) -> Result<Option<Self>> {
        if content.trim().is_empty() {
            return Ok(None);
        }

        let Some(first) = serde_yaml::Deserializer::from_str(content).next() else {
            return Ok(None);
        };
        let value = match Value::deserialize(first) {
            Ok(value) => value,
            Err(_) if !mentions_modules_section(content) => return Ok(None),
            Err(err) => return Err(ModuleError::malformed_document(path, err.to_string())),
        };

        let Value::Mapping(mapping) = value else {
            return Ok(None);
        };
        let Some(section) = mapping.get(MODULES_SECTION) else {
            return Ok(None);
        };

        let modules: Vec<RawModule> = match section {
            Value::Null => Vec::new(),
            section => serde_yaml::from_value(section.clone()).map_err(|err| {
                ModuleError::malformed_document(path, format!("invalid modules section: {err}"))
            })?,
        };

        if let Some(index) = modules.iter().position(|module| module.name.trim().is_empty()) {
            return Err(ModuleError::malformed_document(
                path,
                format!("modules[{index}] is missing a name"),
            ));
        }

        Ok(Some(Self {
            path: path.to_path_buf(),
            modules,
        }))
    }

    /// Classify every reference, producing the typed document
    pub fn classify(self, org_host: &str) -> Result<ModuleDocument> {
        let declarations = self
            .modules
            .into_iter()
            .map(|module| {
                let references = module
                    .uses
                    .iter()
                    .map(|raw| Reference::parse(raw, org_host, &self.path))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ModuleDeclaration {
                    name: module.name,
                    references,
                    input: module.input,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ModuleDocument {
            path: self.path,
            declarations,
        })
    }
}

/// A named module entry with classified references
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDeclaration {
    /// Name, unique only within the owning document
    pub name: String,
    /// References in declaration order
    pub references: Vec<Reference>,
    /// Rule inputs, passed through untouched
    pub input: Option<Value>,
}

/// A loaded module document
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDocument {
    /// Canonical document path
    pub path: PathBuf,
    /// Declarations in document order
    pub declarations: Vec<ModuleDeclaration>,
}

/// Directory relative references of the document at `path` resolve against
pub fn document_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("/"))
}

fn mentions_modules_section(content: &str) -> bool {
    content.contains(&format!("{MODULES_SECTION}:"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::reference::ReferenceKind;

    fn parse(content: &str) -> Result<Option<RawModuleDocument>> {
        RawModuleDocument::parse(Path::new("/ws/modules.yaml"), content)
    }

    #[test]
    fn test_parse_modules_section() {
        let raw = parse(
            r#"
modules:
  - name: aws
    uses:
      - ./rules/aws
      - selefra/aws_misconfigure
  - name: empty
"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(raw.modules.len(), 2);
        assert_eq!(raw.modules[0].name, "aws");
        assert_eq!(raw.modules[0].uses, vec!["./rules/aws", "selefra/aws_misconfigure"]);
        assert!(raw.modules[1].uses.is_empty());
    }

    #[test]
    fn test_files_without_modules_section() {
        assert_eq!(parse("rules:\n  - name: r1\n    query: select 1\n").unwrap(), None);
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("- just\n- a list\n").unwrap(), None);
    }

    #[test]
    fn test_multi_document_rule_file_is_not_a_module_document() {
        let content = "rules:\n  - name: a\n---\nrules:\n  - name: b\n";
        assert_eq!(parse(content).unwrap(), None);
        assert_eq!(parse("rules: [unclosed\n").unwrap(), None);
    }

    #[test]
    fn test_first_document_of_stream_is_read() {
        let raw = parse("modules:\n  - name: first\n---\nmodules:\n  - name: second\n")
            .unwrap()
            .unwrap();
        assert_eq!(raw.modules.len(), 1);
        assert_eq!(raw.modules[0].name, "first");
    }

    #[test]
    fn test_null_modules_section_is_empty_document() {
        let raw = parse("modules:\n").unwrap().unwrap();
        assert!(raw.modules.is_empty());
    }

    #[test]
    fn test_malformed_documents() {
        for content in [
            "modules: [unclosed",
            "modules: 42\n",
            "modules:\n  - uses: [a]\n",
            "modules:\n  - name: ''\n",
            "modules:\n  - name: a\n    color: blue\n",
        ] {
            assert!(
                matches!(parse(content), Err(ModuleError::MalformedDocument { .. })),
                "expected malformed: {content:?}"
            );
        }
    }

    #[test]
    fn test_input_is_preserved() {
        let raw = parse("modules:\n  - name: a\n    input:\n      region: us-east-1\n")
            .unwrap()
            .unwrap();
        let document = raw.classify("app.selefra.io").unwrap();
        let input = document.declarations[0].input.as_ref().unwrap();
        assert_eq!(input["region"], Value::from("us-east-1"));
    }

    #[test]
    fn test_classify_references() {
        let document = parse("modules:\n  - name: a\n    uses: [./x.yaml, selefra/aws, app.selefra.io/acme/p]\n")
            .unwrap()
            .unwrap()
            .classify("app.selefra.io")
            .unwrap();

        let kinds: Vec<_> = document.declarations[0]
            .references
            .iter()
            .map(Reference::kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ReferenceKind::Local,
                ReferenceKind::HomePackage,
                ReferenceKind::OrgPackage
            ]
        );
        assert_eq!(document_dir(&document.path), Path::new("/ws"));
    }

    #[test]
    fn test_classify_rejects_malformed_reference() {
        let err = parse("modules:\n  - name: a\n    uses: ['selefra/']\n")
            .unwrap()
            .unwrap()
            .classify("app.selefra.io")
            .unwrap_err();

        assert!(matches!(err, ModuleError::ReferenceMalformed { ref document, .. } if document == Path::new("/ws/modules.yaml")));
    }
}
