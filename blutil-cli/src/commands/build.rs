//! Compile, load and run command implementations.

use anyhow::{Context, Result};
use blutil::{Command, DeviceFileName, DeviceIdentity, RunOutcome, compile_source};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::config::Config;
use crate::{Cli, open_session, resolve_model, toolchain_dir, use_fancy_output};

/// Which stages of the pipeline to perform, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Steps {
    /// Compile the source with the matching compiler.
    pub compile: bool,
    /// Upload the compiled image.
    pub load: bool,
    /// Start the application.
    pub run: bool,
}

impl Steps {
    /// Compile only.
    pub const COMPILE: Self = Self {
        compile: true,
        load: false,
        run: false,
    };

    /// Whether the module has to be reached for these steps when `model`
    /// is (or is not) known up front.
    pub fn needs_device(self, model: Option<&str>) -> bool {
        self.load || self.run || model.is_none()
    }

    fn describe(self) -> String {
        let names: Vec<&str> = [
            (self.compile, "compile"),
            (self.load, "load"),
            (self.run, "run"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();
        names.join(", ")
    }
}

fn status(cli: &Cli, icon: &str, plain: &str, message: &str) {
    if !cli.quiet {
        let icon = if use_fancy_output() { icon } else { plain };
        eprintln!("{} {message}", style(icon).cyan());
    }
}

/// Run the requested stages on `file`.
pub(crate) fn cmd_build(cli: &Cli, config: &Config, file: &Path, steps: Steps) -> Result<()> {
    status(
        cli,
        "📦",
        "*",
        &format!("Performing {} for {}", steps.describe(), file.display()),
    );

    let model = resolve_model(cli, config);

    if !steps.needs_device(model) {
        // Model is known and nothing goes to the module: leave the port alone
        let mut compiler = config.compiler(toolchain_dir(cli))?;
        let identity = DeviceIdentity::forced(model.unwrap_or_default());
        compile_source(&mut compiler, file, &identity)?;
        status(cli, "✓", "+", "Compilation success");
        return Ok(());
    }

    let mut session = open_session(cli, config)?;

    if steps.compile {
        let mut compiler = config.compiler(toolchain_dir(cli))?;
        let identity = session.ensure_identity()?;
        status(
            cli,
            "ℹ",
            "i",
            &format!("Device {identity} (compiler {})", identity.compiler_name()),
        );
        session.compile(file, &mut compiler)?;
        status(cli, "✓", "+", "Compilation success");
    }

    if steps.load {
        let pb = progress_bar(cli);
        session.upload_with_progress(file, |sent, total| {
            pb.set_length(total as u64);
            pb.set_position(sent as u64);
        })?;
        pb.finish_and_clear();
        status(cli, "✓", "+", "Upload success");
    }

    if steps.run {
        let outcome = session.run(file)?;
        report_outcome(cli, file, outcome)?;
    }

    session.disconnect()?;
    Ok(())
}

fn progress_bar(cli: &Cli) -> ProgressBar {
    if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message("Uploading");
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb
    }
}

/// Print what the application did right after starting.
///
/// Application output goes to stdout; a refused run becomes an error.
fn report_outcome(cli: &Cli, file: &Path, outcome: RunOutcome) -> Result<()> {
    match outcome {
        RunOutcome::Completed { output } => {
            status(cli, "✓", "+", "Program completed");
            print!("{output}");
        },
        RunOutcome::Output { raw } => {
            status(cli, "ℹ", "i", "Immediate output:");
            print!("{raw}");
        },
        RunOutcome::StillRunning => {
            status(cli, "⏳", "~", "No immediate output, program probably running...");
        },
        RunOutcome::Failed { message } => {
            let name = DeviceFileName::from_path(file)?;
            return Err(blutil::Error::Device {
                command: Command::run(name.as_str())
                    .text()
                    .to_string(),
                message,
            })
            .with_context(|| format!("{name} did not start"));
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_with_model_stays_offline() {
        assert!(!Steps::COMPILE.needs_device(Some("BL600_1.5")));
        assert!(Steps::COMPILE.needs_device(None));
    }

    #[test]
    fn test_load_and_run_always_need_device() {
        let load = Steps {
            compile: false,
            load: true,
            run: false,
        };
        let run = Steps {
            compile: false,
            load: false,
            run: true,
        };
        assert!(load.needs_device(Some("BL600_1.5")));
        assert!(run.needs_device(Some("BL600_1.5")));
    }

    #[test]
    fn test_describe_lists_enabled_steps() {
        let all = Steps {
            compile: true,
            load: true,
            run: true,
        };
        assert_eq!(all.describe(), "compile, load, run");
        assert_eq!(Steps::COMPILE.describe(), "compile");
    }
}
