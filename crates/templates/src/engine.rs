//! Message template engine.
//!
//! Templates are plain text files with `{{dotted.path}}` interpolation and
//! `{{#each list}}...{{/each}}` repetition over a JSON context tree. They are
//! operator-editable, so rendering is forgiving: a missing field or a `null`
//! becomes an empty string, never a leaked token or an error.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use {
    serde_json::Value,
    tracing::{debug, warn},
};

use {
    crate::error::{Context as _, Error, Result},
    dray_common::ChannelType,
};

// ── Parsing ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(Vec<String>),
    Each { path: Vec<String>, body: Vec<Segment> },
}

#[derive(Debug, Clone)]
struct Template {
    segments: Vec<Segment>,
}

fn split_path(raw: &str) -> Vec<String> {
    raw.split('.').map(|part| part.trim().to_string()).collect()
}

fn parse(name: &str, source: &str) -> Result<Template> {
    let mut current: Vec<Segment> = Vec::new();
    // One entry per open `{{#each}}`: the list path and the segments that
    // preceded the block at that nesting level.
    let mut open_blocks: Vec<(Vec<String>, Vec<Segment>)> = Vec::new();
    let mut rest = source;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            current.push(Segment::Literal(rest[..open].to_string()));
        }
        let tail = &rest[open + 2..];
        let Some(close) = tail.find("}}") else {
            return Err(Error::malformed(name, "unterminated {{ tag"));
        };
        let tag = tail[..close].trim();
        rest = &tail[close + 2..];

        if let Some(list) = tag.strip_prefix("#each") {
            let list = list.trim();
            if list.is_empty() {
                return Err(Error::malformed(name, "{{#each}} without a list path"));
            }
            open_blocks.push((split_path(list), std::mem::take(&mut current)));
        } else if tag == "/each" {
            match open_blocks.pop() {
                Some((path, parent)) => {
                    let body = std::mem::replace(&mut current, parent);
                    current.push(Segment::Each { path, body });
                }
                None => {
                    return Err(Error::malformed(name, "{{/each}} without matching {{#each}}"));
                }
            }
        } else {
            current.push(Segment::Field(split_path(tag)));
        }
    }
    if !rest.is_empty() {
        current.push(Segment::Literal(rest.to_string()));
    }
    if !open_blocks.is_empty() {
        return Err(Error::malformed(name, "unclosed {{#each}} block"));
    }
    Ok(Template { segments: current })
}

// ── Rendering ───────────────────────────────────────────────────────────────

impl Template {
    fn render(&self, root: &Value) -> String {
        let mut out = String::new();
        let mut scopes = vec![root];
        render_segments(&self.segments, &mut scopes, &mut out);
        out
    }
}

fn render_segments<'v>(segments: &[Segment], scopes: &mut Vec<&'v Value>, out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Field(path) => out.push_str(&stringify(resolve(scopes, path))),
            Segment::Each { path, body } => {
                let Some(Value::Array(items)) = resolve(scopes, path) else {
                    continue;
                };
                for item in items {
                    scopes.push(item);
                    render_segments(body, scopes, out);
                    scopes.pop();
                }
            }
        }
    }
}

/// Look a dotted path up against the scope stack, innermost scope first, so
/// `{{clientName}}` inside an `{{#each stops}}` block hits the current stop
/// before falling back to the root context.
fn resolve<'v>(scopes: &[&'v Value], path: &[String]) -> Option<&'v Value> {
    scopes.iter().rev().copied().find_map(|scope| lookup(scope, path))
}

fn lookup<'v>(scope: &'v Value, path: &[String]) -> Option<&'v Value> {
    let mut value = scope;
    for key in path {
        value = value.as_object()?.get(key)?;
    }
    Some(value)
}

fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => {
            if let Some(int) = number.as_i64() {
                int.to_string()
            } else if let Some(uint) = number.as_u64() {
                uint.to_string()
            } else {
                // Display drops the trailing ".0" that Number::to_string keeps.
                number.as_f64().map(|float| format!("{float}")).unwrap_or_default()
            }
        }
        // Containers have no scalar form; templates reach into them with a
        // dotted path or {{#each}}.
        Some(Value::Array(_) | Value::Object(_)) => String::new(),
    }
}

/// Replace every `null` in the tree with an empty string, in place.
pub fn sanitize(value: &mut Value) {
    match value {
        Value::Null => *value = Value::String(String::new()),
        Value::Array(items) => items.iter_mut().for_each(sanitize),
        Value::Object(map) => map.values_mut().for_each(sanitize),
        _ => {}
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// Loads, compiles, and caches the per-channel template files.
pub struct TemplateEngine {
    dir: PathBuf,
    names: HashMap<ChannelType, String>,
    cache: RwLock<HashMap<String, Arc<Template>>>,
}

impl TemplateEngine {
    /// Engine over `dir` with the stock channel-to-file mapping.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let names = HashMap::from([
            (ChannelType::Telegram, "telegram.md".to_string()),
            (ChannelType::Email, "email.html".to_string()),
            (ChannelType::Sms, "sms.txt".to_string()),
            (ChannelType::Push, "push.txt".to_string()),
        ]);
        Self {
            dir: dir.into(),
            names,
            cache: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map `channel` to a different template file name.
    pub fn set_template_name(&mut self, channel: ChannelType, name: impl Into<String>) {
        self.names.insert(channel, name.into());
    }

    #[must_use]
    pub fn template_name(&self, channel: ChannelType) -> Option<&str> {
        self.names.get(&channel).map(String::as_str)
    }

    /// The full channel-to-file mapping, in channel declaration order.
    #[must_use]
    pub fn template_names(&self) -> Vec<(ChannelType, &str)> {
        ChannelType::ALL
            .iter()
            .copied()
            .filter_map(|channel| self.template_name(channel).map(|name| (channel, name)))
            .collect()
    }

    /// Whether the template file mapped to `channel` exists on disk.
    #[must_use]
    pub fn has_template(&self, channel: ChannelType) -> bool {
        self.template_name(channel)
            .is_some_and(|name| self.dir.join(name).is_file())
    }

    /// Render the message body for `channel`.
    ///
    /// The context is sanitized first so `null` never reaches the output;
    /// fields absent from the context render as empty strings.
    pub fn render_for_channel(&self, channel: ChannelType, context: &Value) -> Result<String> {
        let name = self
            .template_name(channel)
            .ok_or(Error::NoTemplateForChannel(channel))?
            .to_string();
        let template = self.compiled(&name)?;
        let mut context = context.clone();
        sanitize(&mut context);
        Ok(template.render(&context))
    }

    /// Drop every compiled template so the next render reloads from disk.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    fn compiled(&self, name: &str) -> Result<Arc<Template>> {
        if let Ok(cache) = self.cache.read()
            && let Some(template) = cache.get(name)
        {
            return Ok(Arc::clone(template));
        }

        let path = self.dir.join(name);
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "template file not found");
                return Err(Error::TemplateMissing { name: name.to_string(), path });
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read template {}", path.display()));
            }
        };
        let template = Arc::new(parse(name, &source)?);

        // Concurrent first renders may compile the same file twice; the
        // results are identical and the last insert wins.
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(name.to_string(), Arc::clone(&template));
        }
        debug!(template = name, "compiled template");
        Ok(template)
    }
}
