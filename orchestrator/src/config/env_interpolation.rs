use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([^}:]+)(?::-(.*?))?\}").expect("valid interpolation pattern");
}

/// Interpolate environment variables in a string
/// Supports ${VAR} and ${VAR:-default} syntax
pub fn interpolate_env_vars(input: &str) -> Result<String> {
    let mut missing_vars = Vec::new();

    let result = ENV_VAR_PATTERN.replace_all(input, |cap: &regex::Captures<'_>| {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => value,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                None => {
                    missing_vars.push(var_name.to_string());
                    cap[0].to_string()
                }
            },
        }
    });

    if !missing_vars.is_empty() {
        anyhow::bail!("Missing required environment variables: {}", missing_vars.join(", "));
    }

    Ok(result.into_owned())
}

/// Interpolate environment variables in YAML content, leaving comment lines untouched
pub fn interpolate_yaml_content(yaml_content: &str) -> Result<String> {
    let lines = yaml_content
        .lines()
        .map(|line| if line.trim().starts_with('#') { Ok(line.to_string()) } else { interpolate_env_vars(line) })
        .collect::<Result<Vec<_>>>()?;

    Ok(lines.join("\n"))
}

/// Load a `.env` file into the process environment. Variables already set win.
pub fn load_env_file(path: &std::path::Path) -> Result<()> {
    dotenvy::from_path(path).with_context(|| format!("Failed to load .env file: {}", path.display()))
}
