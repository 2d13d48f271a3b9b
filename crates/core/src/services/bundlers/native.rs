//! In-process bundler on top of the tree-sitter module model.
//!
//! Relative imports are inlined dependency-first into one flat module; import
//! bindings become `const` aliases where names differ, `export` keywords of
//! inlined modules are dropped, and external imports are hoisted verbatim.
//! The entry keeps its top-level names; a colliding name of an inlined module
//! is given a fresh name throughout that module. Only external imports that
//! bind one local name to different things are a hard collision.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use tree_sitter::Node;

use crate::services::bundle::{BundleError, BundleOutput, BundleRequest, Bundler};
use crate::syntax::{
    erase_types, free_occurrences, parse_tree, Imported, ParsedModule, StatementKind,
    SyntaxError, TopLevelStatement,
};

/// Extensions tried, in order, for extensionless relative specifiers.
const EXTENSIONS: &[&str] = &["ts", "tsx", "js", "mjs"];

pub struct NativeBundler;

impl Bundler for NativeBundler {
    fn bundle(&self, request: &BundleRequest) -> Result<BundleOutput, BundleError> {
        if !request.entry.is_file() {
            return Err(BundleError::MissingEntry(request.entry.clone()));
        }
        let entry =
            request.entry.canonicalize().map_err(|e| BundleError::io(&request.entry, e))?;

        let mut loader = Loader { request, modules: Vec::new(), index: HashMap::new(), visiting: Vec::new() };
        loader.load(&entry)?;
        let mut text = link(&loader.modules)?;
        if request.minify {
            text = minify(&text, &request.output.display().to_string())?;
        }
        if request.source_map {
            warn!(entry = %request.entry.display(), "native bundler does not emit source maps; skipping");
        }

        if let Some(parent) = request.output.parent() {
            fs::create_dir_all(parent).map_err(|e| BundleError::io(parent, e))?;
        }
        fs::write(&request.output, &text).map_err(|e| BundleError::io(&request.output, e))?;
        debug!(
            entry = %request.entry.display(),
            modules = loader.modules.len(),
            bytes = text.len(),
            "native bundle written"
        );

        Ok(BundleOutput {
            output: request.output.clone(),
            source_map: None,
            modules: loader.modules.into_iter().map(|m| m.path).collect(),
        })
    }

    fn name(&self) -> &'static str {
        "native"
    }

    fn version(&self) -> Result<String, BundleError> {
        Ok(crate::version().to_string())
    }
}

struct LoadedModule {
    path: PathBuf,
    parsed: ParsedModule,
    /// Statement index of each relative import → index of the imported module.
    deps: HashMap<usize, usize>,
}

struct Loader<'r> {
    request: &'r BundleRequest,
    /// Post-order: every module comes after the modules it imports.
    modules: Vec<LoadedModule>,
    index: HashMap<PathBuf, usize>,
    visiting: Vec<PathBuf>,
}

impl Loader<'_> {
    fn load(&mut self, path: &Path) -> Result<usize, BundleError> {
        if let Some(&idx) = self.index.get(path) {
            return Ok(idx);
        }
        if let Some(pos) = self.visiting.iter().position(|p| p == path) {
            let chain = self.visiting[pos..]
                .iter()
                .chain(std::iter::once(&path.to_path_buf()))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(BundleError::Cycle(chain));
        }
        self.visiting.push(path.to_path_buf());

        let label = path.display().to_string();
        let source = fs::read_to_string(path).map_err(|e| BundleError::io(path, e))?;
        let parsed = ParsedModule::parse(erase_types(&source, &label)?, label)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut deps = HashMap::new();
        for stmt in parsed.statements() {
            let specifier = match &stmt.kind {
                StatementKind::Import(info) => &info.source,
                StatementKind::ExportAll { source } => {
                    if self.request.is_external(source) {
                        continue;
                    }
                    return Err(unsupported_reexport(path));
                }
                StatementKind::ExportClause { source: Some(source), .. } => {
                    if self.request.is_external(source) {
                        continue;
                    }
                    return Err(unsupported_reexport(path));
                }
                _ => continue,
            };
            if self.request.is_external(specifier) {
                continue;
            }
            if !is_relative(specifier) {
                return Err(BundleError::NotExternal {
                    specifier: specifier.clone(),
                    from: path.to_path_buf(),
                });
            }
            let target = resolve_import(dir, specifier).ok_or_else(|| BundleError::Unresolved {
                specifier: specifier.clone(),
                from: path.to_path_buf(),
            })?;
            deps.insert(stmt.index, self.load(&target)?);
        }

        self.visiting.pop();
        let idx = self.modules.len();
        self.modules.push(LoadedModule { path: path.to_path_buf(), parsed, deps });
        self.index.insert(path.to_path_buf(), idx);
        Ok(idx)
    }
}

fn unsupported_reexport(path: &Path) -> BundleError {
    BundleError::Unsupported {
        path: path.to_path_buf(),
        construct: "re-exports from local modules (`export ... from`); import and export explicitly"
            .to_string(),
    }
}

pub fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// Resolve a relative specifier the way TypeScript-aware bundlers do.
pub fn resolve_import(dir: &Path, specifier: &str) -> Option<PathBuf> {
    let base = dir.join(specifier);
    let mut candidates = vec![base.clone()];
    candidates.extend(EXTENSIONS.iter().map(|ext| with_extension_appended(&base, ext)));
    // `./util.js` written against a `./util.ts` source.
    if let Some(stem) = specifier.strip_suffix(".js").or_else(|| specifier.strip_suffix(".mjs")) {
        let stem = dir.join(stem);
        candidates.extend(["ts", "tsx"].iter().map(|ext| with_extension_appended(&stem, ext)));
    }
    candidates.extend(EXTENSIONS.iter().map(|ext| base.join(format!("index.{ext}"))));
    candidates.into_iter().find(|c| c.is_file()).and_then(|c| c.canonicalize().ok())
}

fn with_extension_appended(base: &Path, ext: &str) -> PathBuf {
    let mut raw = base.as_os_str().to_owned();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

/// Tracks which module owns each top-level name of the flat output.
#[derive(Default)]
struct Names {
    owners: HashMap<String, PathBuf>,
}

impl Names {
    fn claim(&mut self, name: &str, path: &Path) -> Result<(), BundleError> {
        match self.owners.get(name) {
            Some(owner) if owner != path => Err(BundleError::Collision {
                name: name.to_string(),
                first: owner.clone(),
                second: path.to_path_buf(),
            }),
            Some(_) => Ok(()),
            None => {
                self.owners.insert(name.to_string(), path.to_path_buf());
                Ok(())
            }
        }
    }

    /// Claim `name` for `path`, or a fresh name when another module owns it.
    /// Returns the fresh name if one was needed.
    fn bind(&mut self, name: &str, path: &Path, avoid: &HashSet<String>) -> Option<String> {
        match self.owners.get(name) {
            Some(owner) if owner == path => None,
            Some(_) => Some(self.fresh(name, path, avoid)),
            None => {
                self.owners.insert(name.to_string(), path.to_path_buf());
                None
            }
        }
    }

    fn fresh(&mut self, base: &str, path: &Path, avoid: &HashSet<String>) -> String {
        let mut candidate = base.to_string();
        let mut n = 2;
        while self.owners.contains_key(&candidate) || avoid.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        self.owners.insert(candidate.clone(), path.to_path_buf());
        candidate
    }
}

fn is_external_import(module: &LoadedModule, stmt: &TopLevelStatement) -> bool {
    matches!(stmt.kind, StatementKind::Import(_)) && !module.deps.contains_key(&stmt.index)
}

/// External import bindings are shared by every module importing the same thing.
fn claim_externals(modules: &[LoadedModule], names: &mut Names) -> Result<(), BundleError> {
    let mut bindings: HashMap<String, (String, Imported)> = HashMap::new();
    for module in modules {
        for stmt in module.parsed.statements() {
            let StatementKind::Import(info) = &stmt.kind else { continue };
            if module.deps.contains_key(&stmt.index) {
                continue;
            }
            for binding in &info.bindings {
                let key = (info.source.clone(), binding.imported.clone());
                match bindings.get(&binding.local) {
                    Some(existing) if *existing == key => {}
                    Some(_) => {
                        return Err(BundleError::Collision {
                            name: binding.local.clone(),
                            first: names.owners.get(&binding.local).cloned().unwrap_or_default(),
                            second: module.path.clone(),
                        })
                    }
                    None => {
                        names.claim(&binding.local, &module.path)?;
                        bindings.insert(binding.local.clone(), key);
                    }
                }
            }
        }
    }
    Ok(())
}

fn link(modules: &[LoadedModule]) -> Result<String, BundleError> {
    let entry = modules.len().saturating_sub(1);
    let mut names = Names::default();
    let mut hoisted: Vec<String> = Vec::new();
    let mut exports: Vec<HashMap<String, String>> = Vec::with_capacity(modules.len());
    let mut bodies: Vec<(&Path, String)> = Vec::with_capacity(modules.len());

    // The entry keeps its own declarations; inlined modules are renamed around them.
    if let Some(module) = modules.get(entry) {
        for stmt in module.parsed.statements() {
            if !matches!(stmt.kind, StatementKind::Import(_)) {
                for name in &stmt.defines {
                    names.claim(name, &module.path)?;
                }
            }
        }
    }
    claim_externals(modules, &mut names)?;

    for (idx, module) in modules.iter().enumerate() {
        let is_entry = idx == entry;
        let parsed = &module.parsed;
        let path = module.path.as_path();
        let avoid = identifier_names(parsed);
        let mut renames: HashMap<String, String> = HashMap::new();
        let mut edits: Vec<(Range<usize>, String)> = Vec::new();
        let mut table: HashMap<String, String> = HashMap::new();

        // Bind every top-level name before rewriting, so renames cover all uses.
        for stmt in parsed.statements() {
            match &stmt.kind {
                StatementKind::Import(info) => {
                    let Some(&dep) = module.deps.get(&stmt.index) else { continue };
                    let mut aliases = Vec::new();
                    for binding in &info.bindings {
                        let target = match &binding.imported {
                            Imported::Named(name) => lookup(&exports[dep], name, modules, dep, path)?,
                            Imported::Default => lookup(&exports[dep], "default", modules, dep, path)?,
                            Imported::Namespace => namespace_object(&exports[dep]),
                        };
                        if target == binding.local {
                            continue;
                        }
                        let local = match names.bind(&binding.local, path, &avoid) {
                            Some(fresh) => {
                                renames.insert(binding.local.clone(), fresh.clone());
                                fresh
                            }
                            None => binding.local.clone(),
                        };
                        aliases.push(format!("const {local} = {target};"));
                    }
                    edits.push((stmt.range.clone(), aliases.join("\n")));
                }
                _ if is_entry => {}
                _ => {
                    for name in &stmt.defines {
                        if let Some(fresh) = names.bind(name, path, &avoid) {
                            renames.insert(name.clone(), fresh);
                        }
                    }
                }
            }
        }
        let renamed = |name: &str| renames.get(name).cloned().unwrap_or_else(|| name.to_string());

        for stmt in parsed.statements() {
            let Some(node) = parsed.statement_node(stmt) else { continue };
            match &stmt.kind {
                StatementKind::Import(_) => {
                    if is_external_import(module, stmt) {
                        let text = parsed.text(node).trim().to_string();
                        if !hoisted.contains(&text) {
                            hoisted.push(text);
                        }
                        edits.push((stmt.range.clone(), String::new()));
                    }
                    continue;
                }
                StatementKind::Declaration { exported } => {
                    if *exported {
                        for name in &stmt.defines {
                            table.insert(name.clone(), renamed(name));
                        }
                        if !is_entry {
                            if let Some(decl) = node.child_by_field_name("declaration") {
                                edits.push((stmt.range.start..decl.start_byte(), String::new()));
                            }
                        }
                    }
                }
                StatementKind::ExportClause { names: exported, source: None } => {
                    for name in exported {
                        table.insert(name.exported.clone(), renamed(&name.local));
                    }
                    if !is_entry {
                        edits.push((stmt.range.clone(), String::new()));
                    }
                    continue;
                }
                StatementKind::ExportDefault if is_entry => {}
                StatementKind::ExportDefault => {
                    let (local, edit) =
                        inline_default(parsed, node, stmt.range.clone(), &renames, &mut names, &avoid, path)?;
                    table.insert("default".to_string(), local);
                    edits.push(edit);
                }
                StatementKind::ExportClause { source: Some(_), .. } | StatementKind::ExportAll { .. } => continue,
                StatementKind::Other => {}
            }
            if renames.is_empty() {
                continue;
            }
            for occurrence in free_occurrences(node, parsed.source()) {
                let Some(fresh) = renames.get(&occurrence.name) else { continue };
                let replacement = if occurrence.shorthand {
                    format!("{}: {fresh}", occurrence.name)
                } else {
                    fresh.clone()
                };
                edits.push((occurrence.range, replacement));
            }
        }
        if !renames.is_empty() {
            debug!(module = %path.display(), renamed = renames.len(), "renamed colliding top-level names");
        }

        exports.push(table);
        bodies.push((path, apply_edits(parsed.source(), edits)));
    }

    let mut out = String::new();
    for import in &hoisted {
        out.push_str(import);
        out.push('\n');
    }
    for (path, body) in bodies {
        let body = body.trim();
        if body.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        if let Some(name) = path.file_name() {
            out.push_str(&format!("// {}\n", name.to_string_lossy()));
        }
        out.push_str(body);
        out.push('\n');
    }
    Ok(out)
}

/// Every identifier spelled anywhere in the module; fresh names avoid them all
/// so a rename can never be captured by a nested binding.
fn identifier_names(parsed: &ParsedModule) -> HashSet<String> {
    let mut ranges = Vec::new();
    collect_kind(parsed.root(), "identifier", &mut ranges);
    collect_kind(parsed.root(), "shorthand_property_identifier_pattern", &mut ranges);
    ranges.into_iter().filter_map(|r| parsed.source().get(r)).map(str::to_string).collect()
}

/// Rewrite `export default ...` of an inlined module; returns the local name
/// now holding the default value and the edit to apply.
fn inline_default(
    parsed: &ParsedModule,
    node: Node<'_>,
    range: Range<usize>,
    renames: &HashMap<String, String>,
    names: &mut Names,
    avoid: &HashSet<String>,
    path: &Path,
) -> Result<(String, (Range<usize>, String)), BundleError> {
    let renamed = |name: &str| renames.get(name).cloned().unwrap_or_else(|| name.to_string());
    let declaration = node.child_by_field_name("declaration");
    if let Some(decl) = declaration {
        if let Some(name) = decl.child_by_field_name("name") {
            return Ok((renamed(parsed.text(name)), (range.start..decl.start_byte(), String::new())));
        }
    }
    let Some(expr) = node.child_by_field_name("value").or(declaration) else {
        return Err(BundleError::Unsupported {
            path: path.to_path_buf(),
            construct: "empty `export default`".to_string(),
        });
    };
    if expr.kind() == "identifier" {
        return Ok((renamed(parsed.text(expr)), (range, String::new())));
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect::<String>())
        .unwrap_or_default();
    let local = names.fresh(&format!("__default_{stem}"), path, avoid);
    let text = format!("const {local} = ");
    Ok((local, (range.start..expr.start_byte(), text)))
}

fn lookup(
    table: &HashMap<String, String>,
    name: &str,
    modules: &[LoadedModule],
    dep: usize,
    from: &Path,
) -> Result<String, BundleError> {
    table.get(name).cloned().ok_or_else(|| BundleError::MissingExport {
        name: name.to_string(),
        module: modules[dep].path.clone(),
        from: from.to_path_buf(),
    })
}

fn namespace_object(table: &HashMap<String, String>) -> String {
    let mut entries: Vec<(&String, &String)> = table.iter().collect();
    entries.sort();
    let body = entries
        .into_iter()
        .map(|(exported, local)| {
            if exported == local {
                local.clone()
            } else {
                format!("{exported}: {local}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("Object.freeze({{ {body} }})")
}

fn apply_edits(source: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| range.start);
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (range, replacement) in edits {
        if range.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Strip comments, trailing whitespace and blank lines outside template strings.
pub fn minify(text: &str, label: &str) -> Result<String, SyntaxError> {
    let tree = parse_tree(text, label)?;
    let mut comments = Vec::new();
    collect_kind(tree.root_node(), "comment", &mut comments);
    let edits = comments
        .into_iter()
        .map(|range| {
            let block = text[range.clone()].starts_with("/*");
            (range, if block { " ".to_string() } else { String::new() })
        })
        .collect();
    let stripped = apply_edits(text, edits);

    let tree = parse_tree(&stripped, label)?;
    let mut templates = Vec::new();
    collect_kind(tree.root_node(), "template_string", &mut templates);

    let mut out = String::with_capacity(stripped.len());
    let mut offset = 0;
    for line in stripped.split_inclusive('\n') {
        let span = offset..offset + line.len();
        offset = span.end;
        let in_template = templates.iter().any(|t| t.start < span.end && span.start < t.end);
        if in_template {
            out.push_str(line);
            continue;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    Ok(out)
}

fn collect_kind(node: Node<'_>, kind: &str, out: &mut Vec<Range<usize>>) {
    if node.kind() == kind {
        out.push(node.byte_range());
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_kind(child, kind, out);
    }
}
