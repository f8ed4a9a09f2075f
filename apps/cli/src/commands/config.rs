//! Config command implementation.

use anyhow::Result;
use colored::Colorize;
use trainctl_core::ClientConfig;

/// Prints the effective configuration after all sources are merged.
pub fn execute(config: &ClientConfig, json_output: bool) -> Result<()> {
    if json_output {
        let effective = serde_json::json!({
            "upload_url": config.upload_url(),
            "stream_url": config.stream_url(),
            "log_level": config.log_level.as_deref().unwrap_or("info"),
            "output": { "format": config.output.format },
        });
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    println!("{}", "Effective Configuration".bold().cyan());
    println!("  upload_url: {}", config.upload_url().green());
    println!("  stream_url: {}", config.stream_url().green());
    println!("  log_level:  {}", config.log_level.as_deref().unwrap_or("info"));
    println!("  format:     {}", config.output.format);
    println!();
    println!("  {}", format!("Global: {}", ClientConfig::default_global_path().display()).dimmed());
    println!("  {}", format!("Local:  {}", ClientConfig::default_local_path().display()).dimmed());
    Ok(())
}
