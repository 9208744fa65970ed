use std::{env, env::VarError};

/// The worker takes no arguments, so any argument prints the help and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Only print known, non-secret variables
    const DISPLAY_ENVS: [&str; 7] = [
        "RUST_LOG",
        "MKT_DATABASE_URL",
        "MKT_DB_MAX_CONNECTIONS",
        "MKT_RECONCILE_INTERVAL_SECS",
        "MKT_SETTLEMENT_MAX_ATTEMPTS",
        "MKT_SETTLEMENT_RETRY_DELAY_MS",
        "MKT_RUN_ONCE",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
