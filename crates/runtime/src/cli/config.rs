use ta_domain::config::{Config, ConfigSeverity};
use ta_domain::language::display_language;

/// Parse and validate the config, printing any issues.
///
/// Returns `false` when errors are found.
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

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("serializing config: {e}"))?;
    print!("{output}");
    Ok(())
}

/// Print one line per configured persona.
pub fn personas(config: &Config) {
    if config.personas.is_empty() {
        println!("No personas configured.");
        return;
    }
    for (id, p) in &config.personas {
        println!(
            "{id:<12} {:<20} voice={:<10} language={}",
            p.display_name,
            p.voice_id,
            display_language(&p.language_code),
        );
    }
}
