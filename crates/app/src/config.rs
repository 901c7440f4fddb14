use std::fmt;
use std::path::{Path, PathBuf};

use assessment_core::model::RandomDraw;
use services::{AnswerPolicy, ServiceOptions};

pub const DEFAULT_DB_URL: &str = "sqlite://assessments.sqlite3";

pub const ENV_DB_URL: &str = "ASSESSMENT_DB_URL";
pub const ENV_ANSWER_POLICY: &str = "ASSESSMENT_ANSWER_POLICY";
pub const ENV_RANDOM_DRAW: &str = "ASSESSMENT_RANDOM_DRAW";
pub const ENV_ORDERING: &str = "ASSESSMENT_ORDERING";

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidAnswerPolicy { raw: String },
    InvalidRandomDraw { raw: String },
    InvalidOrdering { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidAnswerPolicy { raw } => {
                write!(f, "invalid answer policy: {raw} (expected trusted|strict)")
            }
            ArgsError::InvalidRandomDraw { raw } => write!(
                f,
                "invalid random draw: {raw} (expected with-replacement|without-replacement)"
            ),
            ArgsError::InvalidOrdering { raw } => {
                write!(f, "invalid ordering: {raw} (expected sequential|random)")
            }
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

/// Everything parsed from the command line and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub db_url: String,
    pub options: ServiceOptions,
    /// Non-flag arguments in order: the command and its operands.
    pub positionals: Vec<String>,
    pub end_existing: bool,
    pub referer: Option<String>,
    pub option_id: Option<String>,
    pub count: Option<u64>,
    pub options_per_question: Option<u64>,
    pub help: bool,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number(value: String, flag: &'static str) -> Result<u64, ArgsError> {
    value
        .trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw: value })
}

pub fn parse_answer_policy(raw: &str) -> Result<AnswerPolicy, ArgsError> {
    AnswerPolicy::parse(raw).ok_or_else(|| ArgsError::InvalidAnswerPolicy {
        raw: raw.to_owned(),
    })
}

pub fn parse_random_draw(raw: &str) -> Result<RandomDraw, ArgsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "with-replacement" => Ok(RandomDraw::WithReplacement),
        "without-replacement" => Ok(RandomDraw::WithoutReplacement),
        _ => Err(ArgsError::InvalidRandomDraw {
            raw: raw.to_owned(),
        }),
    }
}

/// Returns `true` for sequential ordering.
pub fn parse_ordering(raw: &str) -> Result<bool, ArgsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "sequential" => Ok(true),
        "random" => Ok(false),
        _ => Err(ArgsError::InvalidOrdering {
            raw: raw.to_owned(),
        }),
    }
}

impl Args {
    /// Parse from the process environment and the given arguments (without argv[0]).
    pub fn from_env(args: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        Self::parse(args, |key| std::env::var(key).ok())
    }

    /// Parse with an explicit environment lookup; flags override variables.
    pub fn parse(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env(ENV_DB_URL)
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut options = ServiceOptions::default();
        if let Some(raw) = env(ENV_ANSWER_POLICY) {
            options.answer_policy = parse_answer_policy(&raw)?;
        }
        if let Some(raw) = env(ENV_RANDOM_DRAW) {
            options.random_draw = parse_random_draw(&raw)?;
        }
        if let Some(raw) = env(ENV_ORDERING) {
            options.sequential = parse_ordering(&raw)?;
        }

        let mut parsed = Self {
            db_url: String::new(),
            options,
            positionals: Vec::new(),
            end_existing: false,
            referer: None,
            option_id: None,
            count: None,
            options_per_question: None,
            help: false,
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--answer-policy" => {
                    let value = require_value(&mut args, "--answer-policy")?;
                    parsed.options.answer_policy = parse_answer_policy(&value)?;
                }
                "--random-draw" => {
                    let value = require_value(&mut args, "--random-draw")?;
                    parsed.options.random_draw = parse_random_draw(&value)?;
                }
                "--ordering" => {
                    let value = require_value(&mut args, "--ordering")?;
                    parsed.options.sequential = parse_ordering(&value)?;
                }
                "--end-existing" => parsed.end_existing = true,
                "--referer" => parsed.referer = Some(require_value(&mut args, "--referer")?),
                "--option" => parsed.option_id = Some(require_value(&mut args, "--option")?),
                "--count" => {
                    let value = require_value(&mut args, "--count")?;
                    parsed.count = Some(parse_number(value, "--count")?);
                }
                "--options" => {
                    let value = require_value(&mut args, "--options")?;
                    parsed.options_per_question = Some(parse_number(value, "--options")?);
                }
                "--help" | "-h" => parsed.help = true,
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => parsed.positionals.push(arg),
            }
        }

        parsed.db_url = db_url;
        Ok(parsed)
    }
}

/// Turns relative file paths into absolute `sqlite://` URLs.
pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Creates the database file (and its directory) so the pool can open it.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn flags_override_environment() {
        let env = |key: &str| match key {
            ENV_DB_URL => Some("sqlite://from-env.sqlite3".to_owned()),
            ENV_ANSWER_POLICY => Some("strict".to_owned()),
            _ => None,
        };
        let parsed = Args::parse(
            args(&["start", "abc", "--end-existing", "--answer-policy", "trusted"]),
            env,
        )
        .unwrap();

        assert_eq!(parsed.db_url, "sqlite://from-env.sqlite3");
        assert_eq!(parsed.options.answer_policy, AnswerPolicy::Trusted);
        assert_eq!(parsed.positionals, vec!["start", "abc"]);
        assert!(parsed.end_existing);
    }

    #[test]
    fn ordering_from_environment_and_flag() {
        let env = |key: &str| (key == ENV_ORDERING).then(|| "sequential".to_owned());
        assert!(Args::parse(args(&["seed"]), env).unwrap().options.sequential);

        let overridden = Args::parse(args(&["--ordering", "random", "seed"]), env).unwrap();
        assert!(!overridden.options.sequential);

        assert!(matches!(
            Args::parse(args(&["--ordering", "shuffled"]), |_| None),
            Err(ArgsError::InvalidOrdering { .. })
        ));
    }

    #[test]
    fn defaults_without_environment() {
        let parsed = Args::parse(args(&["seed"]), |_| None).unwrap();
        assert_eq!(parsed.db_url, DEFAULT_DB_URL);
        assert_eq!(parsed.options, ServiceOptions::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Args::parse(args(&["--random-draw", "sometimes"]), |_| None),
            Err(ArgsError::InvalidRandomDraw { .. })
        ));
        assert!(matches!(
            Args::parse(args(&["--db"]), |_| None),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(
            Args::parse(args(&["--verbose"]), |_| None),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn memory_and_url_forms_are_kept() {
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
        assert!(normalize_sqlite_url("data/quiz.sqlite3".into()).starts_with("sqlite:///"));
    }
}
