use anyhow::{Context as _, Result};

use crate::Context;

pub fn run(_ctx: &Context) -> Result<()> {
    let schema = super::provider().schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to encode schemas")?;
    println!("{json}");
    Ok(())
}
