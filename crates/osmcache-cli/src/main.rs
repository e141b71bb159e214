//! osmcache - command-line lookups against Online Scout Manager.
//!
//! Each run resumes the saved session (if still fresh), answers one
//! command from the lazily-populated cache, and saves the session again.

mod commands;
mod credentials;

use std::io;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use osmcache_core::models::{BadgeIdv, BadgeType, MemberId, SectionId, TermId};
use osmcache_core::{ClientConfig, HttpTransport, SessionStore};

const USAGE: &str = "\
Usage: osmcache [--section ID] [--term ID] [--usage] <command>

Commands:
  login [EMAIL]                     Log in (password from keychain or prompt)
  logout                            End the session and forget cached data
  sections                          Sections you hold a role in
  terms [SECTION]                   Terms of the section
  members [SECTION]                 Members of the section in the term
  patrols [SECTION]                 Patrols and points
  events [SECTION]                  Events in the term
  badges [SECTION] [TYPE]           Badges of a type (challenge, activity, staged, core)
  requirements MEMBER BADGE[_VER]   Requirement progress of one member

Options:
  --section ID   Section to use instead of your default
  --term ID      Term to use instead of the current one
  --usage        Print remote call counts when done";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { email: Option<String> },
    Logout,
    Sections,
    Terms,
    Members,
    Patrols,
    Events,
    Badges { badge_type: BadgeType },
    Requirements { member: MemberId, badge: BadgeIdv },
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub command: Command,
    pub section: Option<SectionId>,
    pub term: Option<TermId>,
    pub show_usage: bool,
}

fn parse_id(flag: &str, value: Option<&String>) -> Result<i64> {
    let value = value.ok_or_else(|| anyhow!("{} needs a value", flag))?;
    value
        .parse()
        .with_context(|| format!("{} expects a number, got '{}'", flag, value))
}

/// `93` or `93_1` (badge id and version).
fn parse_badge(value: &str) -> Result<BadgeIdv> {
    let (id, version) = value.split_once('_').unwrap_or((value, "0"));
    let id = id
        .parse()
        .with_context(|| format!("bad badge id '{}'", value))?;
    let version = version
        .parse()
        .with_context(|| format!("bad badge version '{}'", value))?;
    Ok(BadgeIdv::new(id, version))
}

/// Commands that take an optional positional section id.
fn section_arg(
    rest: &[&str],
    section: &mut Option<SectionId>,
    command: Command,
) -> Result<Command> {
    match rest {
        [] => Ok(command),
        [id] => {
            *section = Some(
                id.parse()
                    .with_context(|| format!("bad section id '{}'", id))?,
            );
            Ok(command)
        }
        _ => Err(anyhow!("too many arguments")),
    }
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut section = None;
    let mut term = None;
    let mut show_usage = false;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--section" => section = Some(parse_id("--section", iter.next())?),
            "--term" => term = Some(parse_id("--term", iter.next())?),
            "--usage" => show_usage = true,
            "-h" | "--help" => positional.insert(0, "help"),
            other if other.starts_with("--") => return Err(anyhow!("unknown option '{}'", other)),
            other => positional.push(other),
        }
    }

    let command = match positional.as_slice() {
        [] | ["help", ..] => Command::Help,
        ["login"] => Command::Login { email: None },
        ["login", email] => Command::Login {
            email: Some(email.to_string()),
        },
        ["logout"] => Command::Logout,
        ["sections"] => Command::Sections,
        ["terms", rest @ ..] => section_arg(rest, &mut section, Command::Terms)?,
        ["members", rest @ ..] => section_arg(rest, &mut section, Command::Members)?,
        ["patrols", rest @ ..] => section_arg(rest, &mut section, Command::Patrols)?,
        ["events", rest @ ..] => section_arg(rest, &mut section, Command::Events)?,
        ["badges", rest @ ..] => {
            // An optional numeric section comes before the optional type
            let rest = match rest.first().map(|s| s.parse::<SectionId>()) {
                Some(Ok(id)) => {
                    section = Some(id);
                    &rest[1..]
                }
                _ => rest,
            };
            let badge_type = match rest {
                [] => BadgeType::Challenge,
                [name] => BadgeType::from_name(name)
                    .ok_or_else(|| anyhow!("unknown badge type '{}'", name))?,
                _ => return Err(anyhow!("too many arguments for badges")),
            };
            Command::Badges { badge_type }
        }
        ["requirements", member, badge] => Command::Requirements {
            member: member
                .parse()
                .with_context(|| format!("bad member id '{}'", member))?,
            badge: parse_badge(badge)?,
        },
        other => return Err(anyhow!("unknown command '{}'", other.join(" "))),
    };

    Ok(Invocation {
        command,
        section,
        term,
        show_usage,
    })
}

/// Log to stderr, and to a daily file in `log_dir` when there is one.
/// Use RUST_LOG to control the level (e.g. RUST_LOG=osmcache_core=debug).
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "osmcache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if invocation.command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = ClientConfig::load().context("Failed to load configuration")?;
    let log_dir = config
        .cache_dir()
        .ok()
        .filter(|dir| std::fs::create_dir_all(dir).is_ok());
    let _guard = init_tracing(log_dir.as_deref());
    info!(command = ?invocation.command, "osmcache starting");

    config
        .validate()
        .context("Incomplete configuration (check OSM_APP_ID and OSM_APP_TOKEN)")?;
    let transport = HttpTransport::new(&config).context("Failed to create HTTP client")?;
    let store = SessionStore::for_config(&config).context("Failed to locate session store")?;
    let mut connection = store.restore(&config.app_id, &config.app_token, Box::new(transport));
    if let Some(section) = invocation.section {
        connection.set_current_section(section);
    }

    let result = commands::run(&mut connection, &mut config, &invocation).await;

    if invocation.show_usage {
        commands::print_usage(connection.usage());
    }
    if let Err(e) = store.save(&connection) {
        warn!(error = %e, "Could not save session");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_args(&args("")).unwrap().command, Command::Help);
        assert_eq!(
            parse_args(&args("login leader@example.com")).unwrap().command,
            Command::Login {
                email: Some("leader@example.com".to_string())
            }
        );
        assert_eq!(
            parse_args(&args("badges activity")).unwrap().command,
            Command::Badges {
                badge_type: BadgeType::Activity
            }
        );
        assert_eq!(
            parse_args(&args("requirements 7 93_1")).unwrap().command,
            Command::Requirements {
                member: 7,
                badge: BadgeIdv::new(93, 1)
            }
        );
    }

    #[test]
    fn test_parse_options() {
        let invocation = parse_args(&args("--section 100 members --term 3 --usage")).unwrap();
        assert_eq!(invocation.command, Command::Members);
        assert_eq!(invocation.section, Some(100));
        assert_eq!(invocation.term, Some(3));
        assert!(invocation.show_usage);

        let invocation = parse_args(&args("badges 200 staged")).unwrap();
        assert_eq!(invocation.section, Some(200));
        assert_eq!(
            invocation.command,
            Command::Badges {
                badge_type: BadgeType::Staged
            }
        );
        assert_eq!(parse_args(&args("patrols 300")).unwrap().section, Some(300));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args("members --section")).is_err());
        assert!(parse_args(&args("--section abc members")).is_err());
        assert!(parse_args(&args("badges shiny")).is_err());
        assert!(parse_args(&args("frobnicate")).is_err());
        assert!(parse_args(&args("--verbose sections")).is_err());
    }

    #[test]
    fn test_parse_badge_defaults_version() {
        assert_eq!(parse_badge("93").unwrap(), BadgeIdv::new(93, 0));
        assert!(parse_badge("x_1").is_err());
    }
}
