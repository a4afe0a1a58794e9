//! Template sources, the named-template cache, and interpolation.
//!
//! Syntax:
//!
//! - `{{path}}` escaped value, `{{{path}}}` raw value
//! - `{{#if path}}..{{else}}..{{/if}}` truthiness switch
//! - `{{#each path}}..{{/each}}` repeat per list item; inside, `{{this}}`,
//!   `{{this.x}}`, `{{@index}}` and bare item keys resolve against the item
//! - `<slot id="key"></slot>` marks where child view `key` is spliced in

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use parking_lot::Mutex;
use serde_json::Value;

use crate::data::path;
use crate::view::error::ViewError;

pub type TemplateFn =
    Arc<dyn Fn(Value) -> LocalBoxFuture<'static, anyhow::Result<String>> + Send + Sync>;

/// Where a view's markup comes from.
#[derive(Clone, Default)]
pub enum Template {
    /// Renders nothing of its own (children only via explicit slots).
    #[default]
    Empty,
    /// Inline template text.
    Static(String),
    /// Async function of the view-data.
    Function(TemplateFn),
    /// Looked up (once) in the [`TemplateRegistry`].
    Named(String),
}

impl Template {
    pub fn inline(source: impl Into<String>) -> Self {
        Template::Static(source.into())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Template::Named(name.into())
    }

    pub fn from_fn<F, Fut>(render: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + 'static,
    {
        Template::Function(Arc::new(move |data| Box::pin(render(data))))
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Template::Empty => write!(f, "Empty"),
            Template::Static(src) => write!(f, "Static({} bytes)", src.len()),
            Template::Function(_) => write!(f, "Function"),
            Template::Named(name) => write!(f, "Named({})", name),
        }
    }
}

/// Loads named template text.
#[async_trait(?Send)]
pub trait TemplateSource: Send + Sync {
    async fn load(&self, name: &str) -> anyhow::Result<String>;
}

/// In-memory template map.
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplates {
    templates: HashMap<String, String>,
}

impl MemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }
}

#[async_trait(?Send)]
impl TemplateSource for MemoryTemplates {
    async fn load(&self, name: &str) -> anyhow::Result<String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("template '{}' not found", name))
    }
}

/// Reads `<dir>/<name>.html`.
#[derive(Debug, Clone)]
pub struct DirTemplates {
    dir: PathBuf,
}

impl DirTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait(?Send)]
impl TemplateSource for DirTemplates {
    async fn load(&self, name: &str) -> anyhow::Result<String> {
        let file = self.dir.join(format!("{}.html", name));
        tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read template '{}': {}", file.display(), e))
    }
}

/// Memoising front for a [`TemplateSource`]. Clones share the cache.
#[derive(Clone)]
pub struct TemplateRegistry {
    source: Arc<dyn TemplateSource>,
    cache: Arc<Mutex<HashMap<String, Arc<str>>>>,
}

impl TemplateRegistry {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.lock().contains_key(name)
    }

    /// Seed or replace a cached template.
    pub fn insert(&self, name: impl Into<String>, source: impl AsRef<str>) {
        self.cache.lock().insert(name.into(), Arc::from(source.as_ref()));
    }

    pub fn invalidate(&self, name: &str) {
        self.cache.lock().remove(name);
    }

    pub async fn resolve(&self, name: &str) -> Result<Arc<str>, ViewError> {
        if let Some(hit) = self.cache.lock().get(name).cloned() {
            return Ok(hit);
        }
        let loaded: Arc<str> = self
            .source
            .load(name)
            .await
            .map_err(|e| ViewError::Template(format!("{:#}", e)))?
            .into();
        tracing::debug!(template = %name, "Template loaded");
        self.cache.lock().insert(name.to_string(), loaded.clone());
        Ok(loaded)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new(Arc::new(MemoryTemplates::new()))
    }
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var { path: String, raw: bool },
    If { path: String, then: Vec<Node>, otherwise: Vec<Node> },
    Each { path: String, body: Vec<Node> },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Var { path: String, raw: bool },
    OpenIf(String),
    OpenEach(String),
    Else,
    CloseIf,
    CloseEach,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ViewError> {
    let mut tokens = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }
        let after = &rest[start..];
        let (raw, open_len, close) = if after.starts_with("{{{") {
            (true, 3, "}}}")
        } else {
            (false, 2, "}}")
        };
        let body_start = &after[open_len..];
        let Some(end) = body_start.find(close) else {
            return Err(ViewError::Template(format!(
                "unclosed tag near '{}'",
                after.chars().take(24).collect::<String>()
            )));
        };
        let tag = body_start[..end].trim();
        rest = &body_start[end + close.len()..];

        let token = if raw {
            Token::Var {
                path: tag.to_string(),
                raw: true,
            }
        } else if let Some(path) = tag.strip_prefix("#if ") {
            Token::OpenIf(path.trim().to_string())
        } else if let Some(path) = tag.strip_prefix("#each ") {
            Token::OpenEach(path.trim().to_string())
        } else if tag == "else" {
            Token::Else
        } else if tag == "/if" {
            Token::CloseIf
        } else if tag == "/each" {
            Token::CloseEach
        } else if tag.is_empty() {
            return Err(ViewError::Template("empty tag".to_string()));
        } else {
            Token::Var {
                path: tag.to_string(),
                raw: false,
            }
        };
        tokens.push(token);
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    Ok(tokens)
}

/// Which closing tag ended a parsed block.
#[derive(Debug, PartialEq)]
enum Terminator {
    Eof,
    Else,
    CloseIf,
    CloseEach,
}

fn parse_block(
    tokens: &mut std::vec::IntoIter<Token>,
) -> Result<(Vec<Node>, Terminator), ViewError> {
    let mut nodes = Vec::new();
    while let Some(token) = tokens.next() {
        match token {
            Token::Text(text) => nodes.push(Node::Text(text)),
            Token::Var { path, raw } => nodes.push(Node::Var { path, raw }),
            Token::OpenIf(path) => {
                let (then, end) = parse_block(tokens)?;
                let otherwise = match end {
                    Terminator::CloseIf => Vec::new(),
                    Terminator::Else => {
                        let (otherwise, end) = parse_block(tokens)?;
                        if end != Terminator::CloseIf {
                            return Err(ViewError::Template(format!("unterminated #if {}", path)));
                        }
                        otherwise
                    }
                    _ => return Err(ViewError::Template(format!("unterminated #if {}", path))),
                };
                nodes.push(Node::If { path, then, otherwise });
            }
            Token::OpenEach(path) => {
                let (body, end) = parse_block(tokens)?;
                if end != Terminator::CloseEach {
                    return Err(ViewError::Template(format!("unterminated #each {}", path)));
                }
                nodes.push(Node::Each { path, body });
            }
            Token::Else => return Ok((nodes, Terminator::Else)),
            Token::CloseIf => return Ok((nodes, Terminator::CloseIf)),
            Token::CloseEach => return Ok((nodes, Terminator::CloseEach)),
        }
    }
    Ok((nodes, Terminator::Eof))
}

fn parse(source: &str) -> Result<Vec<Node>, ViewError> {
    let mut tokens = tokenize(source)?.into_iter();
    match parse_block(&mut tokens)? {
        (nodes, Terminator::Eof) => Ok(nodes),
        (_, stray) => Err(ViewError::Template(format!("unexpected {:?}", stray))),
    }
}

/// Item scope for `#each` bodies.
struct Scope<'a> {
    item: &'a Value,
    index: usize,
    parent: Option<&'a Scope<'a>>,
}

impl Scope<'_> {
    fn lookup(&self, key: &str) -> Option<Value> {
        if key == "this" {
            return Some(self.item.clone());
        }
        if key == "@index" {
            return Some(Value::from(self.index));
        }
        if let Some(rest) = key.strip_prefix("this.") {
            return path::get_path(self.item, rest).cloned();
        }
        if self.item.is_object() {
            if let Some(found) = path::get_path(self.item, key) {
                return Some(found.clone());
            }
        }
        self.parent.and_then(|parent| parent.lookup(key))
    }
}

fn render_nodes(
    nodes: &[Node],
    resolve: &dyn Fn(&str) -> Option<Value>,
    scope: Option<&Scope<'_>>,
    out: &mut String,
) {
    let lookup = |key: &str| scope.and_then(|s| s.lookup(key)).or_else(|| resolve(key));

    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var { path: key, raw } => {
                let text = lookup(key).map(|v| path::display(&v)).unwrap_or_default();
                if *raw {
                    out.push_str(&text);
                } else {
                    out.push_str(&escape_html(&text));
                }
            }
            Node::If { path: key, then, otherwise } => {
                let branch = if lookup(key).is_some_and(|v| path::is_truthy(&v)) {
                    then
                } else {
                    otherwise
                };
                render_nodes(branch, resolve, scope, out);
            }
            Node::Each { path: key, body } => {
                if let Some(Value::Array(items)) = lookup(key) {
                    for (index, item) in items.iter().enumerate() {
                        let inner = Scope {
                            item,
                            index,
                            parent: scope,
                        };
                        render_nodes(body, resolve, Some(&inner), out);
                    }
                }
            }
        }
    }
}

/// Interpolate `source`, resolving every path through `resolve`.
pub fn interpolate(source: &str, resolve: &dyn Fn(&str) -> Option<Value>) -> Result<String, ViewError> {
    let nodes = parse(source)?;
    let mut out = String::with_capacity(source.len());
    render_nodes(&nodes, resolve, None, &mut out);
    Ok(out)
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Placeholder a parent template uses for child `key`.
pub fn slot_tag(key: &str) -> String {
    format!("<slot id=\"{}\"></slot>", key)
}
