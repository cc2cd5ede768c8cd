use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChatId, errors::Error, Result};

/// Secrets read from flat files at startup.
#[derive(Clone)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
    pub bot_token: String,
    pub destination: ChatId,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("bot_token", &"<redacted>")
            .field("destination", &self.destination)
            .finish()
    }
}

/// Where the credential files live.
#[derive(Clone, Debug)]
pub struct CredentialFiles {
    pub api_id: PathBuf,
    pub api_hash: PathBuf,
    pub bot_token: PathBuf,
    pub chat_id: PathBuf,
}

impl CredentialFiles {
    pub fn read(&self) -> Result<Credentials> {
        let api_id = parse_number::<i32>(&self.api_id)?;
        let api_hash = read_value_from_file(&self.api_hash)?;
        let bot_token = read_value_from_file(&self.bot_token)?;
        let destination = ChatId(parse_number::<i64>(&self.chat_id)?);
        Ok(Credentials {
            api_id,
            api_hash,
            bot_token,
            destination,
        })
    }
}

/// Which `MessageSource` the binary reads channels through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Signed-in user session over MTProto. Sees private channels the account joined.
    Mtproto,
    /// Public `t.me/s/<name>` preview pages, no login.
    WebPreview,
}

impl std::str::FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mtproto" => Ok(Self::Mtproto),
            "web" | "web-preview" => Ok(Self::WebPreview),
            other => Err(Error::Config(format!(
                "unknown CHANFWD_SOURCE {other:?} (expected \"mtproto\" or \"web\")"
            ))),
        }
    }
}

/// Typed configuration for the forwarder.
#[derive(Clone, Debug)]
pub struct Config {
    pub credentials: Credentials,

    // Watch lists
    pub keywords_file: PathBuf,
    pub channels_file: PathBuf,
    pub keyword_refresh_interval: Duration,
    pub channel_refresh_interval: Duration,

    // Poll loop
    pub state_dir: PathBuf,
    pub poll_interval: Duration,
    pub fetch_limit: usize,
    pub max_concurrent_fetches: usize,

    // Source adapter
    pub source: SourceKind,
    pub session_file: PathBuf,
    pub web_preview_url: String,
    pub http_timeout: Duration,

    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let files = CredentialFiles {
            api_id: env_path("CHANFWD_API_ID_FILE").unwrap_or_else(|| "api_id.txt".into()),
            api_hash: env_path("CHANFWD_API_HASH_FILE").unwrap_or_else(|| "api_hash.txt".into()),
            bot_token: env_path("CHANFWD_BOT_TOKEN_FILE").unwrap_or_else(|| "token.txt".into()),
            chat_id: env_path("CHANFWD_CHAT_ID_FILE").unwrap_or_else(|| "chat_id.txt".into()),
        };
        let credentials = files.read()?;

        let keywords_file = env_path("CHANFWD_KEYWORDS_FILE").unwrap_or_else(|| "words.txt".into());
        let channels_file =
            env_path("CHANFWD_CHANNELS_FILE").unwrap_or_else(|| "channel.txt".into());
        let keyword_refresh_interval =
            Duration::from_secs(env_u64("CHANFWD_KEYWORD_REFRESH_SECS").unwrap_or(10).max(1));
        let channel_refresh_interval =
            Duration::from_secs(env_u64("CHANFWD_CHANNEL_REFRESH_SECS").unwrap_or(15).max(1));

        let state_dir = env_path("CHANFWD_STATE_DIR").unwrap_or_else(|| ".".into());
        fs::create_dir_all(&state_dir)?;

        let poll_interval =
            Duration::from_millis(env_u64("CHANFWD_POLL_INTERVAL_MS").unwrap_or(1000));
        let fetch_limit = env_usize("CHANFWD_FETCH_LIMIT").unwrap_or(3).max(1);
        let max_concurrent_fetches = env_usize("CHANFWD_MAX_CONCURRENT_FETCHES")
            .unwrap_or(4)
            .max(1);

        let source = match env_str("CHANFWD_SOURCE").and_then(non_empty) {
            Some(v) => v.parse()?,
            None => SourceKind::Mtproto,
        };
        let session_file = env_path("CHANFWD_SESSION_FILE")
            .unwrap_or_else(|| "session_channel_checker.session".into());
        let web_preview_url = env_str("CHANFWD_WEB_PREVIEW_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://t.me".to_string());
        let http_timeout =
            Duration::from_secs(env_u64("CHANFWD_HTTP_TIMEOUT_SECS").unwrap_or(10).max(1));

        // Unset: default file. Set but empty: log to stderr.
        let log_file = match env_str("CHANFWD_LOG_FILE") {
            None => Some(PathBuf::from("telegram_channel_alerts.log")),
            Some(v) => non_empty(v).map(PathBuf::from),
        };

        Ok(Self {
            credentials,
            keywords_file,
            channels_file,
            keyword_refresh_interval,
            channel_refresh_interval,
            state_dir,
            poll_interval,
            fetch_limit,
            max_concurrent_fetches,
            source,
            session_file,
            web_preview_url,
            http_timeout,
            log_file,
        })
    }
}

/// First line of `path`, trimmed. A missing file is a config error.
pub fn read_value_from_file(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(contents.lines().next().unwrap_or("").trim().to_string())
}

fn parse_number<T: std::str::FromStr>(path: &Path) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = read_value_from_file(path)?;
    raw.parse::<T>().map_err(|e| {
        Error::Config(format!("{} does not hold a number ({raw:?}): {e}", path.display()))
    })
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_str(key).and_then(non_empty).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn reads_first_line_of_each_credential_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = CredentialFiles {
            api_id: write(dir.path(), "api_id.txt", "12345\nignored\n"),
            api_hash: write(dir.path(), "api_hash.txt", "  abcdef  \n"),
            bot_token: write(dir.path(), "token.txt", "1:XYZ"),
            chat_id: write(dir.path(), "chat_id.txt", "-1009876543210\n"),
        };

        let creds = files.read().unwrap();
        assert_eq!(creds.api_id, 12345);
        assert_eq!(creds.api_hash, "abcdef");
        assert_eq!(creds.bot_token, "1:XYZ");
        assert_eq!(creds.destination, ChatId(-1009876543210));
    }

    #[test]
    fn missing_credential_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = CredentialFiles {
            api_id: write(dir.path(), "api_id.txt", "1"),
            api_hash: write(dir.path(), "api_hash.txt", "h"),
            bot_token: dir.path().join("missing.txt"),
            chat_id: write(dir.path(), "chat_id.txt", "2"),
        };

        let err = files.read().unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("missing.txt")));
    }

    #[test]
    fn non_numeric_chat_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let files = CredentialFiles {
            api_id: write(dir.path(), "api_id.txt", "1"),
            api_hash: write(dir.path(), "api_hash.txt", "h"),
            bot_token: write(dir.path(), "token.txt", "t"),
            chat_id: write(dir.path(), "chat_id.txt", "@channel"),
        };

        assert!(matches!(files.read(), Err(Error::Config(_))));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = Credentials {
            api_id: 1,
            api_hash: "secret-hash".to_string(),
            bot_token: "secret-token".to_string(),
            destination: ChatId(7),
        };
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("secret"));
    }

    #[test]
    fn source_kind_names() {
        assert_eq!("mtproto".parse::<SourceKind>().unwrap(), SourceKind::Mtproto);
        assert_eq!(" Web ".parse::<SourceKind>().unwrap(), SourceKind::WebPreview);
        assert!(matches!("rss".parse::<SourceKind>(), Err(Error::Config(_))));
    }
}
