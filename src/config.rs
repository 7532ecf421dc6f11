//! Command-line configuration for the `vcc` binary.
//!
//! Built with `clap` derive. The library itself has no global settings;
//! everything here only steers the driver.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::diagnostics::Diagnostics;
use crate::ir::Evaluator;

/// What the driver prints after a successful compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmitKind {
    /// Indented dump of the syntax tree
    Ast,
    /// Textual IR of the lowered module
    Ir,
    /// Evaluate the entry function and print its result
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Color diagnostics when stderr is a terminal
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "vcc", version, about = "Compiler front-end for the vcc language")]
pub struct DriverConfig {
    /// Source file to compile.
    #[arg(required = true)]
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = EmitKind::Ir)]
    pub emit: EmitKind,

    /// Function evaluated by `--emit run`.
    #[arg(long, default_value = "main")]
    pub entry: String,

    /// Instruction budget for `--emit run`.
    #[arg(long, default_value_t = Evaluator::DEFAULT_MAX_STEPS)]
    pub max_steps: u64,

    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,
}

impl DriverConfig {
    /// Diagnostics sink echoing to stderr with the configured coloring.
    pub fn diagnostics(&self) -> Diagnostics {
        match self.color {
            ColorChoice::Auto => Diagnostics::stderr(true),
            ColorChoice::Always => Diagnostics::stderr_colored(),
            ColorChoice::Never => Diagnostics::stderr(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::try_parse_from(["vcc", "prog.vc"]).unwrap();
        assert_eq!(config.input, PathBuf::from("prog.vc"));
        assert_eq!(config.emit, EmitKind::Ir);
        assert_eq!(config.entry, "main");
        assert_eq!(config.max_steps, Evaluator::DEFAULT_MAX_STEPS);
        assert_eq!(config.color, ColorChoice::Auto);
    }

    #[test]
    fn test_flags() {
        let config = DriverConfig::try_parse_from([
            "vcc", "prog.vc", "--emit", "run", "--entry", "start", "--max-steps", "10", "--color",
            "never",
        ])
        .unwrap();
        assert_eq!(config.emit, EmitKind::Run);
        assert_eq!(config.entry, "start");
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.color, ColorChoice::Never);
    }

    #[test]
    fn test_input_required() {
        assert!(DriverConfig::try_parse_from(["vcc"]).is_err());
    }
}
