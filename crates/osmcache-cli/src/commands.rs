//! Command implementations. Each one populates what it needs through the
//! connection, then prints from the registry.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use tracing::warn;

use osmcache_core::calc::patrol_level_abbr;
use osmcache_core::models::{BadgeIdv, BadgeType, MemberId, MemberKey, SectionId, TermId};
use osmcache_core::{ClientConfig, Connection, UsageStats};

use crate::credentials;
use crate::{Command, Invocation};

pub async fn run(
    connection: &mut Connection,
    config: &mut ClientConfig,
    invocation: &Invocation,
) -> Result<()> {
    match &invocation.command {
        Command::Login { email } => login(connection, config, email.as_deref()).await,
        Command::Logout => {
            connection.logout().await.context("Logout failed")?;
            println!("Logged out");
            Ok(())
        }
        Command::Help => Ok(()),
        command => {
            ensure_session(connection, config).await?;
            let term = invocation.term;
            match command {
                Command::Sections => sections(connection).await,
                Command::Terms => terms(connection).await,
                Command::Members => members(connection, term).await,
                Command::Patrols => patrols(connection).await,
                Command::Events => events(connection, term).await,
                Command::Badges { badge_type } => badges(connection, term, *badge_type).await,
                Command::Requirements { member, badge } => {
                    requirements(connection, term, *member, *badge).await
                }
                Command::Login { .. } | Command::Logout | Command::Help => Ok(()),
            }
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn login(
    connection: &mut Connection,
    config: &mut ClientConfig,
    email: Option<&str>,
) -> Result<()> {
    let email = match email.or(config.last_email.as_deref()) {
        Some(email) => email.to_string(),
        None => prompt("Email: ")?,
    };
    let stored = credentials::password(&email).unwrap_or_else(|e| {
        warn!(error = %e, "Could not read keychain");
        None
    });
    let password = match stored {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    if !connection.login(&email, &password).await.context("Login failed")? {
        if let Err(e) = credentials::forget(&email) {
            warn!(error = %e, "Could not remove refused password from keychain");
        }
        let reason = connection
            .last_error()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "no reason given".to_string());
        bail!("Login refused: {}", reason);
    }

    if let Err(e) = credentials::remember(&email, &password) {
        warn!(error = %e, "Could not store password in keychain");
    }
    config.last_email = Some(email.clone());
    config.save().context("Failed to save configuration")?;
    println!("Logged in as {}", email);
    Ok(())
}

/// Log in again with the keychain password when the saved session has
/// lapsed.
async fn ensure_session(connection: &mut Connection, config: &ClientConfig) -> Result<()> {
    if connection.is_authenticated() {
        return Ok(());
    }
    let email = config
        .last_email
        .as_deref()
        .ok_or_else(|| anyhow!("Not logged in. Run `osmcache login` first."))?;
    let password = credentials::password(email)?
        .ok_or_else(|| anyhow!("Session expired. Run `osmcache login` again."))?;
    if !connection.login(email, &password).await? {
        bail!("Session expired and the stored password was refused. Run `osmcache login` again.");
    }
    Ok(())
}

async fn current_section(connection: &mut Connection) -> Result<SectionId> {
    connection
        .current_section()
        .await?
        .ok_or_else(|| anyhow!("You have no sections"))
}

async fn term_or_current(
    connection: &mut Connection,
    section: SectionId,
    term: Option<TermId>,
) -> Result<TermId> {
    match term {
        Some(term) => Ok(term),
        None => connection
            .current_term(section)
            .await?
            .ok_or_else(|| anyhow!("Section {} has no terms", section)),
    }
}

async fn sections(connection: &mut Connection) -> Result<()> {
    let current = connection.current_section().await?;
    for section in connection.sections().await? {
        let marker = if Some(section.id) == current { "*" } else { " " };
        let kind = section
            .section_type
            .get()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("{} {:>8}  {:<10} {}", marker, section.id, kind, section.display_name());
    }
    Ok(())
}

async fn terms(connection: &mut Connection) -> Result<()> {
    let section = current_section(connection).await?;
    let current = connection.current_term(section).await?;
    for term in connection.terms(section).await? {
        let marker = if Some(term.id) == current { "*" } else { " " };
        let span = term
            .span()
            .map(|(start, end)| format!("{} - {}", start, end))
            .unwrap_or_else(|| "-".to_string());
        let name = term.name.get().map(String::as_str).unwrap_or("");
        println!("{} {:>8}  {:<25} {}", marker, term.id, span, name);
    }
    Ok(())
}

async fn members(connection: &mut Connection, term: Option<TermId>) -> Result<()> {
    let section = current_section(connection).await?;
    let term = term_or_current(connection, section, term).await?;
    connection.patrols(section).await?;
    let keys: Vec<MemberKey> = connection
        .members(section, Some(term))
        .await?
        .iter()
        .map(|m| m.key)
        .collect();

    let registry = connection.registry();
    let section_type = registry.section(section).and_then(|s| s.section_type.get().copied());
    let today = Local::now().date_naive();
    let mut rows: Vec<_> = keys.iter().filter_map(|key| registry.member(*key)).collect();
    rows.sort_by_key(|m| m.display_name());

    for member in rows {
        let age = member
            .age_on(today)
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        let patrol = member
            .patrol_id
            .get()
            .and_then(|id| registry.patrol(section, *id))
            .and_then(|p| p.name.get().cloned())
            .unwrap_or_default();
        let role = match (section_type, member.patrol_role_level.get()) {
            (Some(section_type), Some(level)) => patrol_level_abbr(section_type, *level),
            _ => "",
        };
        println!(
            "{:>8}  {:<30} {:>3}  {:<20} {}",
            member.key.member,
            member.display_name(),
            age,
            patrol,
            role
        );
    }
    Ok(())
}

async fn patrols(connection: &mut Connection) -> Result<()> {
    let section = current_section(connection).await?;
    for patrol in connection.patrols(section).await? {
        let name = patrol.name.get().map(String::as_str).unwrap_or("?");
        println!("{:>6}  {:<25} {}", patrol.id, name, patrol.display_points());
    }
    Ok(())
}

async fn events(connection: &mut Connection, term: Option<TermId>) -> Result<()> {
    let section = current_section(connection).await?;
    let term = term_or_current(connection, section, term).await?;
    for event in connection.events(section, Some(term)).await? {
        let name = event.name.get().map(String::as_str).unwrap_or("?");
        let cost = event
            .cost
            .get()
            .map(|c| c.to_string())
            .unwrap_or_default();
        println!("{:>8}  {:<25} {:<35} {}", event.id, event.date_range(), name, cost);
    }
    Ok(())
}

async fn badges(
    connection: &mut Connection,
    term: Option<TermId>,
    badge_type: BadgeType,
) -> Result<()> {
    let section = current_section(connection).await?;
    let term = term_or_current(connection, section, term).await?;
    for badge in connection.badges(section, Some(term), badge_type).await? {
        let name = badge.name.get().map(String::as_str).unwrap_or("?");
        let group = badge.group_name.get().map(String::as_str).unwrap_or("");
        println!("{:>10}  {:<35} {}", badge.idv.to_string(), name, group);
    }
    Ok(())
}

async fn requirements(
    connection: &mut Connection,
    term: Option<TermId>,
    member: MemberId,
    idv: BadgeIdv,
) -> Result<()> {
    let section = current_section(connection).await?;
    let term = term_or_current(connection, section, term).await?;
    let key = MemberKey::new(section, member);
    let report = connection.requirement_status(key, Some(term), idv).await?;

    let registry = connection.registry();
    let badge_name = registry
        .badge(idv)
        .and_then(|b| b.name.get().cloned())
        .unwrap_or_else(|| idv.to_string());
    let member_name = registry
        .member(key)
        .map(|m| m.full_name())
        .unwrap_or_else(|| format!("Member {}", member));
    println!("{} - {}", member_name, badge_name);

    let Some(badge) = registry.badge(idv) else {
        return Ok(());
    };
    if report.is_empty() {
        println!("  (no requirements available)");
    }
    for status in report {
        let mark = if status.met {
            "done"
        } else if status.skippable {
            "optional"
        } else {
            ""
        };
        let name = badge
            .requirement(&status.field_id)
            .map(|r| r.name.as_str())
            .unwrap_or("");
        println!("  {:<3} {:<40} {}", status.area, name, mark);
    }
    Ok(())
}

pub fn print_usage(usage: &UsageStats) {
    eprintln!("{} remote call(s)", usage.total_calls());
    for (endpoint, stats) in usage.iter() {
        eprintln!(
            "  {:>4}  {:>6} ms avg  {}",
            stats.count,
            stats.average().as_millis(),
            endpoint
        );
    }
}
