//! Source listing.

use console::style;

use crate::cli::helpers::truncate;
use crate::config::Config;

/// List configured sources.
pub fn cmd_sources(config: &Config) -> anyhow::Result<()> {
    if config.sources.is_empty() {
        println!(
            "{} No sources configured. See config/sources.example.toml.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Event Sources").bold());
    println!("{}", "-".repeat(100));
    println!("{:<15} {:<20} {:<40} Output", "ID", "Name", "Reveal");
    println!("{}", "-".repeat(100));

    for (id, source) in &config.sources {
        let marker = match source.validate() {
            Ok(()) => String::new(),
            Err(e) => format!("  {} {}", style("invalid:").red(), e),
        };
        println!(
            "{:<15} {:<20} {:<40} {}{}",
            truncate(id, 14),
            truncate(&source.name_or(id), 19),
            truncate(&source.reveal.describe(), 39),
            config.output_path(source).display(),
            marker
        );
    }

    Ok(())
}
