use anyhow::Result;
use declarative::ApplyContext;

use crate::Context;
use crate::cli::ConnectionArgs;
use crate::ui;

pub fn run(ctx: &Context, connection: ConnectionArgs) -> Result<()> {
    ui::header("OpenCTI Provider Check");

    let mut provider = super::provider();
    let diagnostics = provider.configure(&ApplyContext::new(), connection.into());
    super::report(&diagnostics, "Configuration")?;

    let metadata = provider.metadata();
    ui::success("Connected to the platform");
    ui::kv("Endpoint", provider.endpoint().unwrap_or_default());
    ui::kv("Platform version", provider.platform_version().unwrap_or_default());
    ui::kv("Provider version", &metadata.version);

    if !ctx.quiet {
        ui::section(&format!("Resource types ({})", metadata.resources.len()));
        for name in &metadata.resources {
            ui::dim(name);
        }
    }
    Ok(())
}
