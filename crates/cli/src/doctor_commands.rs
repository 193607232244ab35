//! `dray doctor` — config validation and delivery readiness audit.
//!
//! Runs a series of checks against the local installation and prints a
//! structured report with `[ok]`, `[warn]`, `[fail]`, `[skip]`, or `[info]`
//! status indicators per item.

use std::path::Path;

use {
    anyhow::Result,
    dray_channels::CHANNEL_PRIORITY,
    dray_config::{
        DrayConfig,
        validate::{self, Severity},
    },
    dray_templates::TemplateEngine,
};

// ── ANSI helpers ────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Per-check result used to build the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Skip,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Skip => DIM,
            Self::Info => CYAN,
        }
    }
}

struct CheckItem {
    status: Status,
    message: String,
}

struct Section {
    title: String,
    items: Vec<CheckItem>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push(CheckItem {
            status,
            message: message.into(),
        });
    }
}

// ── Printing ────────────────────────────────────────────────────────────────

fn print_report(sections: &[Section]) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for item in &section.items {
            let color = item.status.color();
            let label = item.status.label();
            eprintln!("  [{color}{label}{RESET}]  {}", item.message);
            match item.status {
                Status::Fail => errors += 1,
                Status::Warn => warnings += 1,
                _ => {},
            }
        }
        eprintln!();
    }

    (errors, warnings)
}

// ── Entry point ─────────────────────────────────────────────────────────────

pub fn handle_doctor(config_path: Option<&Path>, config: &DrayConfig) -> Result<()> {
    eprintln!("{BOLD}dray doctor{RESET}");
    eprintln!("{BOLD}==========={RESET}\n");

    let mut sections = Vec::new();

    // 1. Config validation
    sections.push(check_config(config_path));

    // 2. Channel readiness
    sections.push(check_channels(config));

    // 3. Template availability
    sections.push(check_templates(config));

    let (errors, warnings) = print_report(&sections);

    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

// ── 1. Config validation ────────────────────────────────────────────────────

fn check_config(config_path: Option<&Path>) -> Section {
    let label = config_path
        .map(|p| p.display().to_string())
        .or_else(|| dray_config::find_config_file().map(|p| p.display().to_string()))
        .unwrap_or_else(|| "built-in defaults".into());
    let mut section = Section::new(format!("Config ({label})"));

    let result = validate::validate(config_path);

    // Bucket diagnostics by category for clearer reporting.
    let has_syntax_error = result
        .diagnostics
        .iter()
        .any(|d| d.category == "syntax" && d.severity == Severity::Error);

    if has_syntax_error {
        for d in &result.diagnostics {
            if d.category == "syntax" {
                section.push(Status::Fail, format!("TOML syntax: {}", d.message));
            }
        }
        // Can't do further checks with broken syntax
        return section;
    }

    section.push(Status::Ok, "TOML syntax valid");

    let unknown_fields: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.category == "unknown-field")
        .collect();
    if unknown_fields.is_empty() {
        section.push(Status::Ok, "All fields recognized");
    } else {
        for d in &unknown_fields {
            section.push(Status::Fail, format!("{}: {}", d.path, d.message));
        }
    }

    // Type errors
    let type_errors: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.category == "type-error")
        .collect();
    if type_errors.is_empty() {
        section.push(Status::Ok, "No type errors");
    } else {
        for d in &type_errors {
            section.push(Status::Fail, d.message.clone());
        }
    }

    // File-ref warnings (missing template dir, absent config file)
    for d in &result.diagnostics {
        if d.category == "file-ref" {
            let status = match d.severity {
                Severity::Error => Status::Fail,
                Severity::Warning => Status::Warn,
                Severity::Info => Status::Info,
            };
            let msg = if d.path.is_empty() {
                d.message.clone()
            } else {
                format!("{}: {}", d.path, d.message)
            };
            section.push(status, msg);
        }
    }

    section
}

// ── 2. Channel readiness ────────────────────────────────────────────────────

fn check_channels(config: &DrayConfig) -> Section {
    let mut section = Section::new("Channels");

    let telegram_ready = config.channels.telegram.is_configured();
    let email_ready = config.channels.email.is_configured();

    if telegram_ready {
        section.push(Status::Ok, "telegram: bot token set");
    } else {
        section.push(Status::Info, "telegram: not configured (no bot token)");
    }

    if email_ready {
        section.push(
            Status::Ok,
            format!("email: {} API key set", config.channels.email.provider.as_str()),
        );
    } else {
        section.push(Status::Info, "email: not configured (no API key)");
    }

    if !telegram_ready && !email_ready {
        section.push(
            Status::Fail,
            "no delivery channel is configured; every dispatch will fail",
        );
    }

    if email_ready {
        let from = config.channels.email.from_email.trim();
        if from.is_empty() {
            section.push(Status::Warn, "email from_email is empty");
        } else if !from.contains('@') {
            section.push(
                Status::Warn,
                format!("email from_email \"{from}\" does not look like an address"),
            );
        }
    }

    if config.app.base_url.trim().is_empty() {
        section.push(
            Status::Warn,
            "app.base_url is empty; route links in messages will be broken",
        );
    } else {
        section.push(
            Status::Ok,
            format!("route links point at {}", config.app.base_url_trimmed()),
        );
    }

    section
}

// ── 3. Template availability ────────────────────────────────────────────────

fn check_templates(config: &DrayConfig) -> Section {
    let dir = &config.templates.dir;
    let mut section = Section::new(format!("Templates ({})", dir.display()));

    if !dir.is_dir() {
        section.push(
            Status::Fail,
            format!("templates directory not found: {}", dir.display()),
        );
        return section;
    }

    let engine = TemplateEngine::new(dir);
    for (channel, name) in engine.template_names() {
        if engine.has_template(channel) {
            section.push(Status::Ok, format!("{channel}: {name}"));
        } else if CHANNEL_PRIORITY.contains(&channel) {
            // Missing templates for deliverable channels break every send.
            section.push(Status::Fail, format!("{channel}: {name} not found"));
        } else {
            section.push(
                Status::Skip,
                format!("{channel}: {name} not present (no delivery adapter)"),
            );
        }
    }

    section
}
