use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: clawhands [--config <path>] <command> [options]

Commands:
  check-path <path> [--cwd <dir>] [--session <id>] [--operation <key>] [--user]
  check-command <command> [--cwd <dir>] [--session <id>] [--user]
  resolve <model> [--provider <id>]
  tools";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardArgs {
    pub working_directory: Option<PathBuf>,
    pub session_id: Option<String>,
    pub operation_key: Option<String>,
    pub user_initiated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CheckPath { path: String, guard: GuardArgs },
    CheckCommand { command: String, guard: GuardArgs },
    Resolve { model: String, provider: Option<String> },
    Tools,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub config: Option<PathBuf>,
    pub command: Command,
}

impl Cli {
    /// Parse arguments, excluding the program name.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = None;
        let mut command_name = None;
        let mut positional = Vec::new();
        let mut guard = GuardArgs::default();
        let mut provider = None;

        let mut args = args.into_iter().map(Into::<String>::into);
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{} requires a value", flag))
            };
            match arg.as_str() {
                "--config" => config = Some(PathBuf::from(value("--config")?)),
                "--cwd" => guard.working_directory = Some(PathBuf::from(value("--cwd")?)),
                "--session" => guard.session_id = Some(value("--session")?),
                "--operation" => guard.operation_key = Some(value("--operation")?),
                "--provider" => provider = Some(value("--provider")?),
                "--user" => guard.user_initiated = true,
                "-h" | "--help" => command_name = Some("help".to_string()),
                flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
                _ if command_name.is_none() => command_name = Some(arg),
                _ => positional.push(arg),
            }
        }

        let command = match command_name.as_deref() {
            None | Some("help") => Command::Help,
            Some("check-path") => Command::CheckPath {
                path: single(positional, "check-path <path>")?,
                guard,
            },
            Some("check-command") => Command::CheckCommand {
                command: single(positional, "check-command <command>")?,
                guard,
            },
            Some("resolve") => Command::Resolve {
                model: single(positional, "resolve <model>")?,
                provider,
            },
            Some("tools") => Command::Tools,
            Some(other) => bail!("Unknown command: {}\n\n{}", other, USAGE),
        };

        Ok(Self { config, command })
    }
}

fn single(mut positional: Vec<String>, usage: &str) -> Result<String> {
    if positional.len() != 1 {
        bail!("Usage: clawhands {}", usage);
    }
    Ok(positional.remove(0))
}
