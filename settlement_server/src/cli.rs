use std::{env, env::VarError};

/// The server has no command-line options. Any argument prints the help text and the current configuration.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 18] = [
        "RUST_LOG",
        "SPS_HOST",
        "SPS_PORT",
        "SPS_DATABASE_URL",
        "SPS_ENVIRONMENT",
        "SPS_CALLBACK_BASE_URL",
        "SPS_CALLBACK_HMAC_CHECKS",
        "SPS_DEFAULT_COMMISSION_RATE",
        "SPS_SETTINGS_TTL_SECS",
        "SPS_CURRENCY",
        "SPS_CURRENCY_DECIMALS",
        "SPS_RECONCILE_AFTER_MINS",
        "SPS_RECONCILE_INTERVAL_SECS",
        "SPS_STATS_REFRESH_SECS",
        "SPS_MOMO_BASE_URL",
        "SPS_MOMO_SITE_ID",
        "SPS_MOMO_TIMEOUT_SECS",
        "SPS_MOMO_SANDBOX",
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
