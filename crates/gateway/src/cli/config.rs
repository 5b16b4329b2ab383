use sv_domain::config::{Config, ConfigSeverity};

/// Print every validation issue. Returns `false` when any is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config (defaults and env overrides applied) as TOML.
/// Secrets never appear: the config only names the env vars holding them.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)?;
    print!("{output}");
    Ok(())
}
