use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument prints the help text and the current configuration.
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
    // OFG_WEBHOOK_SECRET and OFG_OPERATOR_TOKEN are deliberately left out
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "OFG_HOST",
        "OFG_PORT",
        "OFG_DATABASE_URL",
        "OFG_ENVIRONMENT",
        "OFG_REQUIRE_TRACKING_NUMBER",
        "OFG_LOW_STOCK_THRESHOLD",
        "OFG_LOW_STOCK_ALERT_WINDOW_HOURS",
        "OFG_MAX_STORED_PAYLOAD",
        "OFG_DELIVERY_TIMEOUT_MS",
        "OFG_MAX_CONCURRENT_DELIVERIES",
        "OFG_EVENT_BUFFER_SIZE",
        "OFG_OPERATOR_EMAIL",
        "OFG_USE_X_FORWARDED_FOR",
        "OFG_USE_FORWARDED",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
