//! Global output flags shared by every subcommand.

use std::sync::OnceLock;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default)]
struct OutputFlags {
    json: bool,
    quiet: bool,
}

static FLAGS: OnceLock<OutputFlags> = OnceLock::new();

/// Record the global flags. Later calls are ignored.
pub fn init(json: bool, quiet: bool) {
    let _ = FLAGS.set(OutputFlags { json, quiet });
}

fn flags() -> OutputFlags {
    FLAGS.get().copied().unwrap_or_default()
}

/// Machine-readable output requested.
pub fn is_json() -> bool {
    flags().json
}

pub fn is_quiet() -> bool {
    flags().quiet
}

/// Interactive decorations (progress bars, banners) are wanted.
pub fn is_interactive() -> bool {
    !is_json() && !is_quiet()
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("  Error: could not serialize output: {e}"),
    }
}
