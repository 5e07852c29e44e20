use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

mod parse;
use self::parse::{Parse, parse_stream};

pub mod address;
pub mod rule;

use self::rule::{ParseRuleError, RuleDescriptor};

/// The rule file, one rule per line:
///
/// ```text
/// <local-host> <local-port> <remote-host> <remote-port> [<property> <value>]...
/// ```
///
/// Tokens are split on whitespace with no quoting or escaping, so a host can
/// never contain spaces or quotes. Blank lines and lines starting with `#`
/// are skipped.
#[derive(Debug, Default)]
pub struct Config {
    pub rules: Vec<RuleDescriptor>,
}

impl Config {
    pub async fn read<P>(path: P) -> eyre::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let data = tokio::fs::read_to_string(path).await?;
        let x = data.parse()?;
        Ok(x)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseRuleError,
}

impl FromStr for Config {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lines = s
            .lines()
            .map(str::trim)
            .enumerate()
            .filter(|(_, line)| !line.is_empty())
            .filter(|(_, line)| !line.starts_with('#'));

        let mut rules = Vec::new();

        for (i, line) in lines {
            let _line = error_span!("line", n = i + 1).entered();

            let rule = RuleDescriptor::parse(&mut parse_stream(line))
                .map_err(|kind| ParseError { line: i + 1, kind })?;

            rules.push(rule);
        }

        Ok(Self { rules })
    }
}
