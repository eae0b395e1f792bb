pub mod agent;
pub mod arm;
pub mod id;
pub mod serve;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::{BackendKind, Config};

fn on_off(enabled: bool, detail: String) -> String {
    if enabled { detail } else { "disabled".to_string() }
}

/// Print the effective settings
pub fn show_config(config: &Config) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let server = &config.server;
    table.add_row(vec!["Bind address", &server.bind]);
    table.add_row(vec![
        "Trust X-Forwarded-For",
        if server.trust_forwarded_for { "yes" } else { "no" },
    ]);
    table.add_row(vec![
        "Origin salt",
        if server.origin_salt.is_some() {
            "configured"
        } else {
            "random per process"
        },
    ]);

    let store = match (config.store.backend, &config.store.path) {
        (BackendKind::Memory, _) => "memory".to_string(),
        (BackendKind::DuckDb, Some(path)) => format!("duckdb ({})", path.display()),
        (BackendKind::DuckDb, None) => "duckdb (in-memory)".to_string(),
    };
    table.add_row(vec!["Store", &store]);

    let policy = &config.policy;
    table.add_row(vec![
        "Rate limit",
        &on_off(
            policy.rate_limit.enabled,
            format!("{} per origin", policy.rate_limit.max_per_origin),
        ),
    ]);
    table.add_row(vec![
        "Expiry",
        &on_off(
            policy.expiry.enabled,
            format!(
                "ttl {}s, sweep every {}s",
                policy.expiry.ttl_secs, policy.expiry.sweep_interval_secs
            ),
        ),
    ]);
    table.add_row(vec![
        "Capacity",
        &on_off(
            policy.capacity.enabled,
            format!("{} entries", policy.capacity.max_entries),
        ),
    ]);

    let agent = &config.agent;
    table.add_row(vec!["Relay URL", &agent.server_url]);
    table.add_row(vec![
        "Poll interval",
        &format!("{}s", agent.poll_interval_secs),
    ]);
    table.add_row(vec!["Identity file", &agent.id_file.display().to_string()]);
    table.add_row(vec!["Shutdown command", &agent.shutdown_argv().join(" ")]);
    table.add_row(vec!["Dry run", if agent.dry_run { "yes" } else { "no" }]);

    eprintln!("\n{table}");
}
