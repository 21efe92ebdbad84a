//! psc: portal session cache CLI
//!
//! Commands:
//!   save [--remember] <profile>  - encrypt and cache a profile (`-` = stdin, `null` = clear)
//!   load                         - print the cached profile, or `null`
//!   clear                        - remove the cached profile from every medium
//!   inspect                      - show which medium holds the entry (never decrypts)
//!   config show                  - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use psc_core::{MediumKind, PscConfig};
use psc_session::{LoadOutcome, SessionCache};
use psc_storage::{CookieAttributes, CookieJar, SessionStore, StorageMedium};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "psc",
    version,
    about = "Portal session cache client",
    long_about = "psc: save, load, and inspect the encrypted LMS portal session cache"
)]
struct Cli {
    /// Path to psc config file
    #[arg(long, short = 'c', env = "PSC_CONFIG", default_value = "~/.config/psc/config.toml")]
    config: PathBuf,

    /// Log level (overrides [logging].level; RUST_LOG overrides both)
    #[arg(long, env = "PSC_LOG")]
    log: Option<String>,

    /// Log format (overrides [logging].format)
    #[arg(long, env = "PSC_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt and cache a profile
    Save {
        /// Keep the session across browser restarts
        #[arg(long, short = 'r')]
        remember: bool,
        /// Profile JSON, `-` to read it from stdin, or `null` to clear the cache
        profile: String,
    },

    /// Print the cached profile as JSON, or `null` when there is none
    Load,

    /// Remove the cached profile from every medium
    Clear,

    /// Show where the cached entry lives without decrypting it
    Inspect,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = expand_tilde(&cli.config);
    let (config, found) = load_config(&config_path).await?;

    let level = cli.log.as_deref().unwrap_or(&config.logging.level);
    let format = match cli.log_format {
        Some(format) => format,
        None => LogFormat::from_str(&config.logging.format, true)
            .map_err(|e| anyhow::anyhow!("invalid [logging].format: {e}"))?,
    };
    init_logging(level, &format);

    if !found {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            config_path.display()
        );
    }
    config.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Save { remember, profile } => {
            cmd_save(&config, &Media::open(&config), &profile, remember)
        }
        Commands::Load => cmd_load(&config, &Media::open(&config)),
        Commands::Clear => cmd_clear(&config, &Media::open(&config)),
        Commands::Inspect => cmd_inspect(&config, &Media::open(&config)),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path, found),
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Read the config file; a missing file yields defaults and `found = false`.
async fn load_config(path: &Path) -> Result<(PscConfig, bool)> {
    if !path.exists() {
        return Ok((PscConfig::default(), false));
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config: {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("parsing config: {}", path.display()))?;
    Ok((config, true))
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output (profiles, headers); logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Expand ~ to $HOME in paths
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(format!("{home}/{rest}"))
    } else {
        path.to_path_buf()
    }
}

// ── File-backed media ─────────────────────────────────────────────────────────

struct Media {
    cookie: Arc<CookieJar>,
    session: Arc<SessionStore>,
}

impl Media {
    fn open(config: &PscConfig) -> Self {
        let cookie_path = expand_tilde(&config.storage.data_dir).join("cookies.json");
        let session_path = expand_tilde(&config.storage.session_dir).join("session.json");
        tracing::debug!(
            cookie = %cookie_path.display(),
            session = %session_path.display(),
            "opening storage media"
        );
        Self {
            cookie: Arc::new(CookieJar::open(
                &cookie_path,
                CookieAttributes::from(&config.cookie),
            )),
            session: Arc::new(SessionStore::open(&session_path)),
        }
    }

    fn cache(&self, config: &PscConfig) -> SessionCache {
        SessionCache::new(config, self.cookie.clone(), self.session.clone())
    }
}

// ── `psc save` ────────────────────────────────────────────────────────────────

fn cmd_save(config: &PscConfig, media: &Media, profile: &str, remember: bool) -> Result<()> {
    let raw = if profile == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading profile from stdin")?;
        buf
    } else {
        profile.to_string()
    };

    let profile = parse_profile(&raw)?;
    let cache = media.cache(config);
    cache.save(profile.as_ref(), remember);

    let Some(profile) = profile else {
        println!("Session cleared");
        return Ok(());
    };
    // A stale entry left by an abandoned save must not count as success
    if cache.load().as_ref() != Some(&profile) {
        anyhow::bail!("session was not cached (see log output)");
    }
    match locate(config, media)? {
        Some(kind) => println!("Session cached in {kind} storage"),
        None => anyhow::bail!("session was not cached (see log output)"),
    }
    Ok(())
}

/// Parse a profile argument; JSON `null` means "no profile".
fn parse_profile(raw: &str) -> Result<Option<serde_json::Value>> {
    let value: serde_json::Value =
        serde_json::from_str(raw.trim()).context("profile is not valid JSON")?;
    Ok((!value.is_null()).then_some(value))
}

// ── `psc load` ────────────────────────────────────────────────────────────────

fn cmd_load(config: &PscConfig, media: &Media) -> Result<()> {
    let outcome = media.cache(config).load_outcome();
    if let LoadOutcome::Hit { medium, .. } = &outcome {
        tracing::info!(medium = %medium, "loaded cached session");
    }
    let value = outcome.into_profile().unwrap_or(serde_json::Value::Null);
    println!(
        "{}",
        serde_json::to_string_pretty(&value).context("rendering profile")?
    );
    Ok(())
}

// ── `psc clear` ───────────────────────────────────────────────────────────────

fn cmd_clear(config: &PscConfig, media: &Media) -> Result<()> {
    media.cache(config).clear();
    println!("Session cleared");
    Ok(())
}

// ── `psc inspect` ─────────────────────────────────────────────────────────────

fn cmd_inspect(config: &PscConfig, media: &Media) -> Result<()> {
    let name = &config.entry.name;
    println!("Entry:    {name}");

    match media.cookie.cookie(name)? {
        Some(cookie) => {
            let max_age = cookie
                .max_age_secs()
                .map(|s| format!("{s}s"))
                .unwrap_or_else(|| "session".into());
            println!("Cookie:   present ({} bytes, max-age {max_age})", cookie.value.len());
            println!(
                "  Set-Cookie: {}",
                cookie.to_set_cookie_header(media.cookie.attributes())
            );
        }
        None => println!("Cookie:   absent"),
    }
    if let Some(path) = media.cookie.path() {
        println!("  file:   {}", path.display());
    }

    match media.session.get(name)? {
        Some(blob) => println!("Session:  present ({} bytes)", blob.len()),
        None => println!("Session:  absent"),
    }
    if let Some(path) = media.session.path() {
        println!("  file:   {}", path.display());
    }

    let cache = media.cache(config);
    if let Some(selector) = cache.selector() {
        let order: Vec<&str> = selector.load_order().iter().map(|k| k.as_str()).collect();
        println!("Load order: {}", order.join(" → "));
    }
    Ok(())
}

/// First medium (in load order) holding the entry, without decrypting it.
fn locate(config: &PscConfig, media: &Media) -> Result<Option<MediumKind>> {
    let cache = media.cache(config);
    let Some(selector) = cache.selector() else {
        return Ok(None);
    };
    for kind in selector.load_order() {
        if selector.medium(kind).contains(cache.entry_name())? {
            return Ok(Some(kind));
        }
    }
    Ok(None)
}

// ── `psc config show` ─────────────────────────────────────────────────────────

fn cmd_config_show(config: &PscConfig, config_path: &Path, found: bool) -> Result<()> {
    if found {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(tmp: &TempDir) -> PscConfig {
        let mut config = PscConfig::default();
        config.storage.data_dir = tmp.path().join("data");
        config.storage.session_dir = tmp.path().join("run");
        config
    }

    #[test]
    fn test_parse_profile() {
        assert_eq!(parse_profile("null").unwrap(), None);
        assert_eq!(parse_profile(" null\n").unwrap(), None);
        assert_eq!(
            parse_profile(r#"{"id":"u1"}"#).unwrap(),
            Some(serde_json::json!({"id": "u1"}))
        );
        assert!(parse_profile("{not json").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        let home = std::env::var("HOME").unwrap_or_default();
        assert_eq!(
            expand_tilde(Path::new("~/x/config.toml")),
            PathBuf::from(format!("{home}/x/config.toml"))
        );
        assert_eq!(expand_tilde(Path::new("/etc/psc")), PathBuf::from("/etc/psc"));
    }

    #[test]
    fn test_save_locates_tier() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let media = Media::open(&config);

        cmd_save(&config, &media, r#"{"id":"u1"}"#, true).unwrap();
        assert_eq!(locate(&config, &media).unwrap(), Some(MediumKind::Cookie));

        cmd_save(&config, &media, r#"{"id":"u1"}"#, false).unwrap();
        assert_eq!(locate(&config, &media).unwrap(), Some(MediumKind::Session));

        cmd_save(&config, &media, "null", false).unwrap();
        assert_eq!(locate(&config, &media).unwrap(), None);
    }

    #[test]
    fn test_save_reports_unwritable_storage() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_in(&tmp);
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        config.storage.data_dir = blocker.join("data");

        let media = Media::open(&config);
        assert!(cmd_save(&config, &media, r#"{"id":"u1"}"#, true).is_err());
        assert_eq!(locate(&config, &media).unwrap(), None);
    }

    #[test]
    fn test_save_reports_stale_entry_as_failure() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);
        let media = Media::open(&config);
        cmd_save(&config, &media, r#"{"id":"old"}"#, true).unwrap();

        let jar_tmp = tmp.path().join("data/cookies.tmp");
        std::fs::create_dir(&jar_tmp).unwrap();

        assert!(cmd_save(&config, &media, r#"{"id":"new"}"#, false).is_err());
        assert_eq!(locate(&config, &media).unwrap(), Some(MediumKind::Cookie));
    }

    #[test]
    fn test_media_files_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(&tmp);

        cmd_save(&config, &Media::open(&config), r#"{"id":"u2"}"#, true).unwrap();

        let media = Media::open(&config);
        assert_eq!(
            media.cache(&config).load(),
            Some(serde_json::json!({"id": "u2"}))
        );
        assert!(tmp.path().join("data/cookies.json").exists());
    }

    #[tokio::test]
    async fn test_load_config_missing_file() {
        let tmp = TempDir::new().unwrap();
        let (config, found) = load_config(&tmp.path().join("absent.toml")).await.unwrap();
        assert!(!found);
        assert_eq!(config.entry.name, "lms_profile");
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[entry]\nname = \"portal_user\"\n").unwrap();

        let (config, found) = load_config(&path).await.unwrap();
        assert!(found);
        assert_eq!(config.entry.name, "portal_user");
    }
}
