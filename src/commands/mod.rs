//! One-shot commands run outside the orchestrator

pub mod check;
pub mod import;
pub mod schema;

use crate::provider::Provider;
use crate::ui;
use anyhow::{Result, bail};
use declarative::Diagnostics;

/// Fail with every diagnostic printed if any of them is an error
fn report(diagnostics: &Diagnostics, what: &str) -> Result<()> {
    for diagnostic in diagnostics {
        ui::diagnostic(diagnostic);
    }
    if diagnostics.has_error() {
        bail!("{what} failed with {} diagnostic(s)", diagnostics.len());
    }
    Ok(())
}

fn provider() -> Provider {
    Provider::new(env!("CARGO_PKG_VERSION"))
}
