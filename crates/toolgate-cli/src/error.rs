use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("invalid config file") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Inspect the effective configuration with:");
        eprintln!("  {} toolgate config", "$".dimmed());
    }

    if msg.contains("sandbox directory") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Pass a sandbox explicitly with --sandbox <DIR>.");
    }

    std::process::exit(2);
}
