//! Flattening of Solidity sources into a single file, as block explorers
//! expect for single-file verification

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use itertools::Itertools;
use regex::Regex;

use crate::errors::ScriptError;

/// Matches every form of import statement, including those spanning several
/// lines: `import "path";`, `import "path" as X;`, `import * as X from "path";`
/// and `import {A, B} from "path";`. The first quoted string is the path.
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\b[^;"']*["']([^"']+)["'][^;]*;"#).expect("valid regex")
});

/// The prefix of the compiler version pragma
const SOLIDITY_PRAGMA: &str = "pragma solidity";

/// The marker of a license comment
const LICENSE_MARKER: &str = "SPDX-License-Identifier";

/// Flatten the Solidity file at `entry`, inlining its imports.
///
/// Imports are resolved relative to the importing file first, then
/// relative to `root`. Every file is emitted once, after the files it
/// imports. Pragmas are deduplicated and hoisted to the top along with the
/// first license identifier. Only the first version pragma is kept.
pub fn flatten(entry: &Path, root: &Path) -> Result<String, ScriptError> {
    let mut flattener = Flattener::new(root);
    flattener.visit(entry)?;
    Ok(flattener.finish())
}

/// The state of a flattening pass
struct Flattener {
    /// The fallback directory against which imports are resolved
    root: PathBuf,
    /// The canonical paths of the files already inlined
    visited: HashSet<PathBuf>,
    /// The license line, taken from the first file declaring one
    license: Option<String>,
    /// The version pragma, taken from the first file declaring one
    solidity_pragma: Option<String>,
    /// The distinct other pragma lines, in order of appearance
    pragmas: Vec<String>,
    /// The file bodies, dependencies first
    bodies: Vec<String>,
}

impl Flattener {
    /// Create an empty flattener
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            visited: HashSet::new(),
            license: None,
            solidity_pragma: None,
            pragmas: Vec::new(),
            bodies: Vec::new(),
        }
    }

    /// Inline the given file and, before it, everything it imports
    fn visit(&mut self, path: &Path) -> Result<(), ScriptError> {
        let canonical = path
            .canonicalize()
            .map_err(|e| ScriptError::SourceFlattening(format!("{}: {e}", path.display())))?;

        // Also breaks import cycles
        if !self.visited.insert(canonical.clone()) {
            return Ok(());
        }

        let source = fs::read_to_string(&canonical)
            .map_err(|e| ScriptError::SourceFlattening(format!("{}: {e}", path.display())))?;
        let dir = canonical.parent().unwrap_or(Path::new("."));

        for captures in IMPORT_RE.captures_iter(&source) {
            let import = self.resolve(dir, &captures[1])?;
            self.visit(&import)?;
        }

        let source = IMPORT_RE.replace_all(&source, "");
        let mut body = Vec::new();
        for line in source.lines() {
            let trimmed = line.trim();
            if trimmed.contains(LICENSE_MARKER) && trimmed.starts_with("//") {
                self.license.get_or_insert_with(|| trimmed.to_string());
                continue;
            }

            if trimmed.starts_with(SOLIDITY_PRAGMA) {
                self.solidity_pragma.get_or_insert_with(|| trimmed.to_string());
                continue;
            }

            if trimmed.starts_with("pragma ") {
                if !self.pragmas.iter().any(|p| p == trimmed) {
                    self.pragmas.push(trimmed.to_string());
                }
                continue;
            }

            body.push(line);
        }

        let file_name = canonical
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bodies.push(format!(
            "// File: {file_name}\n\n{}",
            body.join("\n").trim()
        ));

        Ok(())
    }

    /// Resolve an import path against the importing directory, then the root
    fn resolve(&self, dir: &Path, import: &str) -> Result<PathBuf, ScriptError> {
        [dir.join(import), self.root.join(import)]
            .into_iter()
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| {
                ScriptError::SourceFlattening(format!(
                    "cannot resolve import \"{import}\" from {}",
                    dir.display()
                ))
            })
    }

    /// Assemble the flattened source
    fn finish(self) -> String {
        let header = self
            .license
            .into_iter()
            .chain(self.solidity_pragma)
            .chain(self.pragmas)
            .join("\n");
        let bodies = self.bodies.into_iter().join("\n\n");

        if header.is_empty() {
            format!("{bodies}\n")
        } else {
            format!("{header}\n\n{bodies}\n")
        }
    }
}
