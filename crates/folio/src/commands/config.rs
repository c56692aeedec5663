//! Config command - inspect configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::Style;
use folio_config::SourceStatus;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration and where it came from
    Show,

    /// Show configuration file paths
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&ctx.config)?);
        return Ok(());
    }

    println!("# folio configuration\n");

    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)\n");
    } else {
        for source in &sources {
            println!("# from {}", source.display());
        }
        println!();
    }

    for warning in ctx.loaded.warnings() {
        let yellow = Style::new().yellow();
        println!("{} {}", yellow.apply_to("# warning:"), warning);
    }

    // Print effective sections, defaults included.
    let mut effective = ctx.config.clone();
    effective.server = Some(ctx.config.server());
    effective.auth = Some(ctx.config.auth());
    effective.portfolio = Some(ctx.config.portfolio());
    print!("{}", effective.to_toml()?);
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        let sources: Vec<_> = ctx
            .loaded
            .sources
            .iter()
            .map(|s| {
                serde_json::json!({
                    "layer": s.layer.to_string(),
                    "path": s.path,
                    "loaded": s.is_loaded(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    for source in &ctx.loaded.sources {
        let status = match &source.status {
            SourceStatus::Loaded => "loaded".to_string(),
            SourceStatus::Missing => "not found".to_string(),
            SourceStatus::Invalid(reason) => format!("ignored: {reason}"),
        };
        println!(
            "{:<8} {}  {}",
            source.layer,
            source.path.display(),
            dim.apply_to(format!("({status})"))
        );
    }
    if ctx.loaded.sources.is_empty() {
        println!("{}", dim.apply_to("No config locations could be resolved"));
    }
    Ok(())
}
