// File: ./src/cli.rs
//! Shared command-line interface logic: argument parsing and help text.
use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use std::path::PathBuf;

use crate::model::DATE_FORMAT;

const DEFAULT_PREVIEW_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Reschedule the documents of a directory.
    Apply {
        dir: Option<PathBuf>,
        documents: Vec<String>,
    },
    /// Preview the dates an expression would produce.
    Next {
        expression: String,
        from: Option<NaiveDate>,
        count: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub root: Option<PathBuf>,
    pub command: Command,
}

/// Parses `args` without the binary name.
pub fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut root = None;
    let mut rest: Vec<&str> = Vec::new();

    let mut iter = args.iter().map(String::as_str);
    while let Some(arg) = iter.next() {
        match arg {
            "-r" | "--root" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow!("--root requires a path"))?;
                root = Some(PathBuf::from(path));
            }
            "-h" | "--help" | "help" => {
                return Ok(CliArgs {
                    root,
                    command: Command::Help,
                });
            }
            other => rest.push(other),
        }
    }

    let command = match rest.split_first() {
        None => Command::Help,
        Some((&"apply", tail)) => {
            let (dir, documents) = match tail.split_first() {
                Some((dir, docs)) => (
                    Some(PathBuf::from(*dir)),
                    docs.iter().map(|d| d.to_string()).collect(),
                ),
                None => (None, Vec::new()),
            };
            Command::Apply { dir, documents }
        }
        Some((&"next", tail)) => parse_next(tail)?,
        Some((other, _)) => bail!("Unknown command: {}", other),
    };

    Ok(CliArgs { root, command })
}

fn parse_next(args: &[&str]) -> Result<Command> {
    let mut expression: Option<String> = None;
    let mut from = None;
    let mut count = DEFAULT_PREVIEW_COUNT;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match *arg {
            "--from" => {
                let value = iter.next().ok_or_else(|| anyhow!("--from requires a date"))?;
                let date = NaiveDate::parse_from_str(value, DATE_FORMAT)
                    .map_err(|e| anyhow!("Invalid --from date '{}': {}", value, e))?;
                from = Some(date);
            }
            "--count" | "-n" => {
                let value = iter.next().ok_or_else(|| anyhow!("--count requires a number"))?;
                count = value
                    .parse::<usize>()
                    .map_err(|e| anyhow!("Invalid --count '{}': {}", value, e))?;
            }
            word => {
                // Unquoted expressions arrive as several words.
                expression = Some(match expression {
                    Some(existing) => format!("{} {}", existing, word),
                    None => word.to_string(),
                });
            }
        }
    }

    let expression = expression.ok_or_else(|| anyhow!("next requires a repeat expression"))?;
    Ok(Command::Next {
        expression,
        from,
        count,
    })
}

pub fn print_help(binary_name: &str) {
    println!(
        "Recur v{} - Reschedules completed repeating tasks",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [--root <path>] apply [<dir>] [<document>...]", binary_name);
    println!(
        "    {} next \"<repeat>\" [--from YYYY-MM-DD] [--count N]",
        binary_name
    );
    println!("    {} --help", binary_name);
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("APPLY COMMAND:");
    println!(
        "    {} apply                    Reschedule every document in the data directory",
        binary_name
    );
    println!(
        "    {} apply ./tasks            Reschedule every *.json document in ./tasks",
        binary_name
    );
    println!(
        "    {} apply ./tasks laundry    Only the document ./tasks/laundry.json",
        binary_name
    );
    println!();
    println!("NEXT COMMAND:");
    println!(
        "    {} next \"every 4 weeks on saturday\" --from 2026-10-20",
        binary_name
    );
    println!();
    println!("REPEAT SYNTAX:");
    println!("    daily, weekly, monthly, yearly");
    println!("    every day | week | month | year");
    println!("    every 3 days, every other week, every 2w, every 6mo");
    println!("    every monday, every mon,wed,fri, every weekday, every weekend");
    println!("    every 2 weeks on mon, thu");
    println!("    every month on the 15th, every month on the last day");
    println!("    ... until 2027-01-01, ... except saturday, ... except july, august");
    println!("    FREQ=WEEKLY;INTERVAL=2;BYDAY=MO (raw RRULE)");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_args_is_help() {
        assert_eq!(parse_args(&[]).unwrap().command, Command::Help);
    }

    #[test]
    fn test_apply_with_root() {
        let parsed = parse_args(&args(&["--root", "/tmp/r", "apply", "dir", "a", "b"])).unwrap();
        assert_eq!(parsed.root, Some(PathBuf::from("/tmp/r")));
        assert_eq!(
            parsed.command,
            Command::Apply {
                dir: Some(PathBuf::from("dir")),
                documents: vec!["a".to_string(), "b".to_string()],
            }
        );
    }

    #[test]
    fn test_apply_default_dir() {
        let parsed = parse_args(&args(&["apply"])).unwrap();
        assert_eq!(
            parsed.command,
            Command::Apply {
                dir: None,
                documents: vec![],
            }
        );
    }

    #[test]
    fn test_next_joins_words() {
        let parsed = parse_args(&args(&[
            "next", "every", "4", "weeks", "--from", "2026-10-20", "on", "saturday", "-n", "3",
        ]))
        .unwrap();
        assert_eq!(
            parsed.command,
            Command::Next {
                expression: "every 4 weeks on saturday".to_string(),
                from: NaiveDate::from_ymd_opt(2026, 10, 20),
                count: 3,
            }
        );
    }

    #[test]
    fn test_bad_input() {
        assert!(parse_args(&args(&["next"])).is_err());
        assert!(parse_args(&args(&["next", "daily", "--from", "tomorrow"])).is_err());
        assert!(parse_args(&args(&["--root"])).is_err());
        assert!(parse_args(&args(&["frobnicate"])).is_err());
    }
}
