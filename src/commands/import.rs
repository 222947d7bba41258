use anyhow::{Context as _, Result, bail};
use declarative::{ApplyContext, LifecycleRequest};
use std::time::Duration;

use crate::Context;
use crate::cli::ConnectionArgs;
use crate::resource::PROVIDER_TYPE_NAME;
use crate::ui;

/// Adopt one entity by id and print the state an import would record
pub fn run(
    ctx: &Context,
    type_name: &str,
    id: &str,
    show_sensitive: bool,
    connection: ConnectionArgs,
) -> Result<()> {
    let type_name = full_type_name(type_name);
    let mut provider = super::provider();
    let Some(schema) = provider.schema().resources.remove(&type_name) else {
        bail!("Unknown resource type {type_name}");
    };

    let timeout = Duration::from_secs(connection.timeout);
    let diagnostics = provider.configure(&ApplyContext::new(), connection.into());
    super::report(&diagnostics, "Configuration")?;

    let response = provider.execute(
        &ApplyContext::new().with_timeout(timeout),
        LifecycleRequest::ImportState {
            type_name: type_name.clone(),
            id: id.to_string(),
        },
    );
    super::report(&response.diagnostics, "Import")?;
    let Some(state) = response.state else {
        bail!("Import of {type_name} {id} returned no state");
    };

    let state = if show_sensitive {
        state
    } else {
        schema.redact(&state)
    };
    if !ctx.quiet {
        ui::success(&format!("Imported {type_name} {id}"));
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&state).context("Failed to encode state")?
    );
    Ok(())
}

/// Accept "role" as well as "opencti_role"
fn full_type_name(name: &str) -> String {
    if name.starts_with(&format!("{PROVIDER_TYPE_NAME}_")) {
        name.to_string()
    } else {
        format!("{PROVIDER_TYPE_NAME}_{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_type_name() {
        assert_eq!(full_type_name("role"), "opencti_role");
        assert_eq!(full_type_name("opencti_role"), "opencti_role");
        assert_eq!(full_type_name("marking_definition"), "opencti_marking_definition");
    }
}
