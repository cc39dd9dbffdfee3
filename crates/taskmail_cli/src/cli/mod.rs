use clap::{Parser, Subcommand};
use taskmail_core::config::{ConfigKey, ConfigOverrides};

pub const DEFAULT_API_URL: &str = "http://localhost:5001";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,

    /// Base URL of a running task API
    #[arg(long, global = true, env = "TASKMAIL_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the task API and the reminder scheduler
    ///
    /// Example: taskmail serve --port 5001
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a single reminder sweep against the local store
    ///
    /// Example: taskmail sweep --json
    Sweep,
    /// List tasks, pending first then completed
    ///
    /// Example: taskmail list
    List,
    /// Add a new task
    ///
    /// Example: taskmail add "File taxes" --deadline 2030-04-15T17:00:00Z
    Add {
        text: String,
        #[arg(long)]
        deadline: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Flip a task between pending and completed
    ///
    /// Example: taskmail toggle task-3f2a
    Toggle { id: String },
    /// Delete a task
    ///
    /// Example: taskmail delete task-3f2a
    Delete { id: String },
}

/// Parse a raw `KEY=VALUE` override string into a config key and its value.
pub fn parse_config_override(raw: &str) -> Result<(ConfigKey, String), String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let (field, remainder) = key_raw
        .split_once('.')
        .map(|(field, rest)| (field.trim(), Some(rest.trim())))
        .unwrap_or((key_raw.trim(), None));

    let canonical_field =
        canonicalize_flag_name(field).ok_or_else(|| "override key cannot be empty".to_string())?;
    let canonical_sub = match remainder {
        Some(segment) => Some(
            canonicalize_flag_name(segment)
                .ok_or_else(|| format!("{canonical_field} override requires a subfield"))?,
        ),
        None => None,
    };

    let key = ConfigKey::from_name(&canonical_field, canonical_sub.as_deref()).ok_or_else(|| {
        match canonical_sub.as_deref() {
            Some(sub) => format!("unknown config field '{canonical_field}.{sub}'"),
            None => format!("unknown config field '{canonical_field}'"),
        }
    })?;

    Ok((key, value_raw.to_string()))
}

/// Fold every `--config-override` into one set; later flags win.
pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let (key, value) = parse_config_override(entry)?;
        overrides
            .set(key, &value)
            .map_err(|err| err.message().to_string())?;
    }
    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
