//! Module file system command implementations.

use anyhow::Result;
use console::style;
use std::path::Path;

use crate::config::Config;
use crate::{Cli, CliError, open_session, use_fancy_output};

/// List files on the module.
pub(crate) fn cmd_list(cli: &Cli, config: &Config) -> Result<()> {
    let mut session = open_session(cli, config)?;
    let listing = session.list()?;
    session.disconnect()?;

    // Listing is the command's output: keep it on stdout
    for line in listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
    {
        println!("{line}");
    }
    Ok(())
}

/// Delete the device file derived from `file`.
pub(crate) fn cmd_delete(cli: &Cli, config: &Config, file: &Path) -> Result<()> {
    let mut session = open_session(cli, config)?;
    session.delete(file)?;
    session.disconnect()?;

    if !cli.quiet {
        let icon = if use_fancy_output() { "✓" } else { "+" };
        eprintln!("{} Deleted {}", style(icon).green(), file.display());
    }
    Ok(())
}

/// Erase the module file system.
pub(crate) fn cmd_format(cli: &Cli, config: &Config, yes: bool) -> Result<()> {
    if !yes {
        return Err(CliError::Usage(
            "format erases every file on the module; pass --yes to confirm".to_string(),
        )
        .into());
    }

    let mut session = open_session(cli, config)?;
    if !cli.quiet {
        let icon = if use_fancy_output() { "🗑" } else { "!" };
        eprintln!("{} Formatting file system...", style(icon).red());
    }
    session.format()?;
    session.disconnect()?;

    if !cli.quiet {
        let icon = if use_fancy_output() { "✓" } else { "+" };
        eprintln!("{} Format complete", style(icon).green().bold());
    }
    Ok(())
}
