// vcc: compiler front-end driver

use std::io::Write;
use std::process::ExitCode;
use std::sync::Once;

use clap::Parser as _;

use vcc::config::{DriverConfig, EmitKind};
use vcc::ir::{Evaluator, RtValue};
use vcc::parser::stream::SourceStream;
use vcc::parser::Parser;

static TRACING_INIT: Once = Once::new();

/// Install a subscriber only when `VCC_LOG` or `RUST_LOG` is set.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let var = ["VCC_LOG", "RUST_LOG"]
            .into_iter()
            .find(|name| std::env::var(name).is_ok());
        if let Some(var) = var {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .with(EnvFilter::from_env(var))
                .init();
        }
    });
}

fn main() -> ExitCode {
    init_tracing();
    let config = DriverConfig::parse();
    match run(&config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("vcc: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &DriverConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let stream = SourceStream::open(&config.input)?;
    let unit = Parser::from_stream(stream, config.diagnostics()).parse();

    if config.emit == EmitKind::Ast {
        print!("{}", unit.dump());
        return Ok(exit_code(!unit.have_error()));
    }

    let compilation = vcc::compile_unit(unit);
    if compilation.have_error() {
        eprintln!("vcc: {} error(s) reported", compilation.diagnostics().len());
        return Ok(ExitCode::FAILURE);
    }

    match config.emit {
        EmitKind::Ast => unreachable!("handled before lowering"),
        EmitKind::Ir => print!("{}", compilation.module),
        EmitKind::Run => {
            let mut eval = Evaluator::new(&compilation.module)?.with_max_steps(config.max_steps);
            register_console(&mut eval);
            let result = eval.call(&config.entry, &[])?;
            tracing::debug!(steps = eval.steps(), "evaluation finished");
            std::io::stdout().flush()?;
            if let Some(value) = result {
                println!("{}", describe(&value));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Host implementations for the console externals a program may declare.
fn register_console(eval: &mut Evaluator<'_>) {
    eval.register_host("puts", |memory, args| {
        let [RtValue::Ptr(address)] = args else {
            return Err("expects a single pointer argument".to_string());
        };
        let text = memory.read_c_string(*address).map_err(|e| e.to_string())?;
        println!("{text}");
        Ok(Some(RtValue::int(32, 0)))
    });
    eval.register_host("putint", |_, args| {
        let value = args
            .first()
            .and_then(RtValue::as_i64)
            .ok_or_else(|| "expects an integer argument".to_string())?;
        println!("{value}");
        Ok(None)
    });
    eval.register_host("putfloat", |_, args| {
        let value = args
            .first()
            .and_then(RtValue::as_f32)
            .ok_or_else(|| "expects a float argument".to_string())?;
        println!("{value}");
        Ok(None)
    });
}

fn describe(value: &RtValue) -> String {
    match value {
        RtValue::Int { bits: 1, raw } => (*raw == 1).to_string(),
        RtValue::Int { .. } => value.as_i64().unwrap_or_default().to_string(),
        RtValue::Float(f) => f.to_string(),
        RtValue::Ptr(address) => format!("{address:#x}"),
        RtValue::Aggregate(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
