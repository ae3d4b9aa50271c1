use clap::{Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("photo-ai-mcp")
        .about("Photo gallery AI helper server (stdio JSON-RPC)")
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
}

// Logs go to stderr; stdout carries JSON-RPC only.
pub fn init_logging(level: Option<&str>) {
    // Explicit level wins, else RUST_LOG, else info
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(lvl) = level {
        builder.parse_filters(lvl);
    }
    builder.target(env_logger::Target::Stderr).init();
}
