use std::{env, io, io::Write};

use terminfo_exec::{
    Error, ExpandContext, ExpandOptions, SearchEnvironment, TerminalEntry, Value,
    expand::{FormatTermination, OperandOrder},
    load,
};
use tracing_subscriber::EnvFilter;

/// Capability to show and its arguments, e.g. `render cup 5 10`
fn requested_capability() -> (String, Vec<Value>) {
    let mut args = env::args().skip(1);
    let Some(name) = args.next() else {
        return ("setab".to_owned(), Vec::new());
    };
    let params = args
        .map(|arg| match arg.parse::<i32>() {
            Ok(number) => Value::from(number),
            Err(_) => Value::from(arg),
        })
        .collect();
    (name, params)
}

fn show_colors(entry: &TerminalEntry, context: &mut ExpandContext) -> Result<(), Error> {
    let Some(colors) = entry.number("colors") else {
        println!("Your terminal has no colors");
        return Ok(());
    };
    println!("Colors: {colors}");
    let reset = context.render(entry, "sgr0", &[]).unwrap_or_default();
    let mut stdout = io::stdout();
    for color in 0..i32::from(colors.min(16)) {
        let sequence = context.render(entry, "setab", &[Value::from(color)])?;
        stdout.write_all(&sequence)?;
        write!(stdout, " {color:2} ")?;
        stdout.write_all(&reset)?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let entry = load(&SearchEnvironment::from_env())?;
    println!("Terminal: {} ({})", entry.name(), entry.description());

    // Arithmetic in real entries expects ncurses operand order
    let mut context = ExpandContext::with_options(ExpandOptions {
        format_termination: FormatTermination::Conversion,
        operand_order: OperandOrder::Conventional,
        ..Default::default()
    });
    let (name, params) = requested_capability();
    if name == "setab" && params.is_empty() {
        return show_colors(&entry, &mut context);
    }

    let sequence = context.render(&entry, &name, &params)?;
    println!("{name}={:?}", String::from_utf8_lossy(&sequence));
    Ok(())
}
