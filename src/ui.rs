//! Terminal output for the one-shot commands
//!
//! Never used by `serve`, where stdout carries the protocol.

use colored::Colorize;
use declarative::{Diagnostic, Severity};

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a diagnostic with its detail indented below
pub fn diagnostic(diagnostic: &Diagnostic) {
    let title = match &diagnostic.attribute {
        Some(attribute) => format!("{} ({attribute})", diagnostic.summary),
        None => diagnostic.summary.clone(),
    };
    match diagnostic.severity {
        Severity::Error => error(&title),
        Severity::Warning => warn(&title),
    }
    for line in diagnostic.detail.lines() {
        dim(line);
    }
}
