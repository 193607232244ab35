//! Configuration validation engine.
//!
//! Validates TOML configuration files against the known schema, detects
//! unknown/misspelled fields, and reports channel-readiness warnings.

use std::{collections::HashMap, path::Path};

use crate::schema::DrayConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "channel", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "channels.telegram.tokn"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

/// Represents the expected shape of the configuration schema.
enum KnownKeys {
    /// A struct with fixed field names.
    Struct(HashMap<&'static str, KnownKeys>),
    /// Scalar value — stop recursion.
    Leaf,
}

/// Build the full schema map mirroring every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    let telegram = || {
        Struct(HashMap::from([
            ("token", Leaf),
            ("api_base", Leaf),
            ("timeout_secs", Leaf),
        ]))
    };

    let email = || {
        Struct(HashMap::from([
            ("provider", Leaf),
            ("api_key", Leaf),
            ("from_email", Leaf),
            ("from_name", Leaf),
            ("api_base", Leaf),
            ("timeout_secs", Leaf),
        ]))
    };

    Struct(HashMap::from([
        ("app", Struct(HashMap::from([("base_url", Leaf)]))),
        ("templates", Struct(HashMap::from([("dir", Leaf)]))),
        (
            "channels",
            Struct(HashMap::from([("telegram", telegram()), ("email", email())])),
        ),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.len();
    let b_len = b.len();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = if ca == cb {
                0
            } else {
                1
            };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

/// Find the best match for `needle` among `candidates` using Levenshtein
/// distance. Returns `Some(best)` if the distance is <= `max_distance`.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`. Only TOML files get a full schema walk;
/// other formats surface type errors at load time instead.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = if let Some(p) = path {
        Some(p.to_path_buf())
    } else {
        crate::loader::find_config_file()
    };

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "file-ref",
                path: String::new(),
                message: "no config file found; using defaults".into(),
            }],
            config_path: None,
        };
    };

    match std::fs::read_to_string(actual_path) {
        Ok(content) => {
            let mut result = validate_toml_str(&content);
            result.config_path = Some(actual_path.clone());
            check_file_references(&content, &mut result.diagnostics);
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("failed to read config file: {e}"),
            }],
            config_path: Some(actual_path.clone()),
        },
    }
}

/// Validate a TOML string without file-system side effects (useful for tests).
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax — parse raw TOML
    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("TOML syntax error: {e}"),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields — walk the TOML tree against KnownKeys
    let schema = build_schema_map();
    check_unknown_fields(&toml_value, &schema, "", &mut diagnostics);

    // 3. Type check — attempt full deserialization
    match toml::from_str::<DrayConfig>(toml_str) {
        Ok(config) => check_channel_readiness(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Walk the TOML value tree against the schema tree and flag unknown keys.
fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (toml::Value::Table(table), KnownKeys::Struct(fields)) = (value, schema) else {
        // Leaf or type mismatch — stop recursion (type errors caught later)
        return;
    };

    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
        } else {
            let level = if prefix.is_empty() {
                "at top level "
            } else {
                ""
            };
            let suggestion = suggest(key, &known_keys, 3);
            let msg = if let Some(s) = suggestion {
                format!("unknown field {level}(did you mean \"{s}\"?)")
            } else {
                format!("unknown field {level}")
            };
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "unknown-field",
                path,
                message: msg.trim().to_string(),
            });
        }
    }
}

/// Report which delivery channels this configuration actually enables.
fn check_channel_readiness(config: &DrayConfig, diagnostics: &mut Vec<Diagnostic>) {
    let telegram_ready = config.channels.telegram.is_configured();
    let email_ready = config.channels.email.is_configured();

    if !telegram_ready {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "channel",
            path: "channels.telegram".into(),
            message: "telegram channel not configured (no bot token)".into(),
        });
    }
    if !email_ready {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "channel",
            path: "channels.email".into(),
            message: "email channel not configured (no API key)".into(),
        });
    }
    if !telegram_ready && !email_ready {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "channel",
            path: "channels".into(),
            message: "no delivery channel is configured; every dispatch will fail".into(),
        });
    }

    if email_ready && config.channels.email.from_email.trim().is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "channel",
            path: "channels.email.from_email".into(),
            message: "email API key is set but from_email is empty".into(),
        });
    } else if !config.channels.email.from_email.is_empty()
        && !config.channels.email.from_email.contains('@')
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "channel",
            path: "channels.email.from_email".into(),
            message: format!(
                "\"{}\" does not look like an email address",
                config.channels.email.from_email
            ),
        });
    }

    if config.app.base_url.trim().is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "channel",
            path: "app.base_url".into(),
            message: "app.base_url is empty; route links in messages will be broken".into(),
        });
    }
}

/// Check that the templates directory referenced by the config exists.
fn check_file_references(toml_str: &str, diagnostics: &mut Vec<Diagnostic>) {
    let Ok(config) = toml::from_str::<DrayConfig>(toml_str) else {
        return;
    };

    if !config.templates.dir.is_dir() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "file-ref",
            path: "templates.dir".into(),
            message: format!(
                "templates directory not found: {}",
                config.templates.dir.display()
            ),
        });
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
