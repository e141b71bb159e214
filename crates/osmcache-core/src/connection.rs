//! The connection: credentials, the entity registry and lazy population.
//!
//! Reads go through the connection. When an attribute is unset and the
//! recipe that supplies it has not run yet, the read runs that recipe once
//! (one remote call), applies the payload across the registry and returns.
//! A recipe counts as run from the moment it starts, so a failed or denied
//! call is never repeated within a session.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{endpoints, wire, FormParams, OsmError, RemoteError, Result, Transport, UsageStats};
use crate::cache::{Attempts, Registry, Slot};
use crate::calc::{self, RequirementStatus, SkipRules, TermSpan};
use crate::config::ClientConfig;
use crate::models::{
    Badge, BadgeIdv, BadgeRecipe, BadgeType, BadgeWork, CustomData, Event, EventAttendance,
    EventId, EventRecipe, Member, MemberField, MemberId, MemberKey, MemberRecipe, Patrol,
    Permissions, Section, SectionId, SectionRecipe, SectionType, Term, TermId, LEADERS_PATROL,
    YOUNG_LEADERS_PATROL,
};
use crate::resolver::{self, badges, events, members, scalar_text, sections};

/// Recipes that cover every section at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConnectionRecipe {
    Roles,
    Terms,
}

/// User session obtained from the credential exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub secret: String,
    pub email: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("secret", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

/// Everything a connection knows, in serializable form. This is what the
/// session store persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionState {
    pub app_id: String,
    pub app_token: String,
    pub credentials: Option<Credentials>,
    pub registry: Registry,
    /// Sections the user holds a role in, in remote order.
    pub sections: Slot<Vec<SectionId>>,
    pub default_section: Option<SectionId>,
    pub current_section: Option<SectionId>,
    pub attempts: Attempts<ConnectionRecipe>,
    pub last_error: Option<RemoteError>,
}

impl ConnectionState {
    pub fn new(app_id: impl Into<String>, app_token: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_token: app_token.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default, deserialize_with = "wire::opt_text")]
    userid: Option<String>,
    #[serde(default, deserialize_with = "wire::opt_text")]
    secret: Option<String>,
}

/// Decode the `error` member of a payload. Blank, `null` and `false` mean
/// there is no error.
fn remote_error(value: &Value) -> Option<RemoteError> {
    match value {
        Value::String(message) if !message.trim().is_empty() => Some(RemoteError {
            code: "error".to_string(),
            message: message.trim().to_string(),
        }),
        Value::Object(map) => {
            let message = map.get("message").and_then(scalar_text);
            let code = map.get("code").and_then(scalar_text);
            if message.is_none() && code.is_none() {
                return None;
            }
            Some(RemoteError {
                code: code.unwrap_or_else(|| "error".to_string()),
                message: message.unwrap_or_default(),
            })
        }
        _ => None,
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct Connection {
    transport: Box<dyn Transport>,
    state: ConnectionState,
    usage: UsageStats,
}

impl Connection {
    /// Create an empty, logged-out connection.
    pub fn new(config: &ClientConfig, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_state(
            ConnectionState::new(&config.app_id, &config.app_token),
            transport,
        ))
    }

    /// Rebuild a connection around previously saved state.
    pub fn from_state(state: ConnectionState, transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state,
            usage: UsageStats::default(),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn app_id(&self) -> &str {
        &self.state.app_id
    }

    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    pub fn usage(&self) -> &UsageStats {
        &self.usage
    }

    /// The structured error from the most recent call, if it returned one.
    pub fn last_error(&self) -> Option<&RemoteError> {
        self.state.last_error.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.credentials.is_some()
    }

    pub fn email(&self) -> Option<&str> {
        self.state.credentials.as_ref().map(|c| c.email.as_str())
    }

    // ===== Transport =====

    /// Post to an endpoint with the application and session credentials.
    ///
    /// `Ok(None)` means no result: either the remote system denied access
    /// (`null`/`false`) or it returned a structured error, which is then
    /// available from `last_error()`. An error that says the session is
    /// gone also logs the connection out.
    pub async fn call(
        &mut self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Option<Value>> {
        let mut form: FormParams = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        form.push(("apiid".to_string(), self.state.app_id.clone()));
        form.push(("token".to_string(), self.state.app_token.clone()));
        if let Some(ref credentials) = self.state.credentials {
            form.push(("userid".to_string(), credentials.user_id.clone()));
            form.push(("secret".to_string(), credentials.secret.clone()));
        }

        let started = Instant::now();
        let result = self.transport.post(endpoint, &form).await;
        let elapsed = started.elapsed();
        self.usage.record(endpoint, elapsed);
        debug!(
            endpoint = %UsageStats::key_for(endpoint),
            elapsed_ms = elapsed.as_millis() as u64,
            ok = result.is_ok(),
            "Remote call"
        );

        let payload = result?;
        let error = match &payload {
            Value::Null | Value::Bool(false) => {
                self.state.last_error = None;
                debug!(endpoint, "Remote system returned no data");
                return Ok(None);
            }
            Value::Object(map) => map.get("error").and_then(remote_error),
            _ => None,
        };

        match error {
            Some(error) => {
                warn!(endpoint, code = %error.code, message = %error.message, "Remote error");
                let ends_session = error.ends_session();
                self.state.last_error = Some(error);
                if ends_session && self.is_authenticated() {
                    info!("Remote session has ended");
                    self.end_session();
                }
                Ok(None)
            }
            None => {
                self.state.last_error = None;
                Ok(Some(payload))
            }
        }
    }

    /// `call` for populate recipes. A call that ended the session must not
    /// be applied to the registry that replaced the old one.
    async fn fetch(&mut self, endpoint: &str, params: &[(&str, String)]) -> Result<Option<Value>> {
        let epoch = self.state.registry.epoch();
        let payload = self.call(endpoint, params).await?;
        if self.state.registry.epoch() != epoch {
            return Err(OsmError::NotAuthenticated);
        }
        Ok(payload)
    }

    fn require_session(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(OsmError::NotAuthenticated)
        }
    }

    /// Forget the user and everything cached on their behalf.
    fn end_session(&mut self) {
        self.state.credentials = None;
        self.state.registry.clear();
        self.state.sections = Slot::Unset;
        self.state.default_section = None;
        self.state.current_section = None;
        self.state.attempts = Attempts::default();
    }

    // ===== Credential exchange =====

    /// Exchange an email and password for a session. Returns `false` when
    /// the remote system refused; the reason is in `last_error()`.
    /// A section chosen with `set_current_section` stays chosen.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<bool> {
        let chosen = self.state.current_section;
        self.end_session();
        self.state.current_section = chosen;
        let params = [
            ("email", email.trim().to_string()),
            ("password", password.to_string()),
        ];
        let Some(payload) = self.call(endpoints::AUTHORISE, &params).await? else {
            return Ok(false);
        };
        let auth: AuthResponse = resolver::decode(endpoints::AUTHORISE, &payload)?;
        match (auth.userid, auth.secret) {
            (Some(user_id), Some(secret)) => {
                info!(user_id = %user_id, "Logged in");
                self.state.credentials = Some(Credentials {
                    user_id,
                    secret,
                    email: email.trim().to_string(),
                });
                Ok(true)
            }
            _ => Err(OsmError::invalid(endpoints::AUTHORISE, "missing userid or secret")),
        }
    }

    /// End the remote session and clear the cache. The cache is cleared
    /// even when the logout call itself fails.
    pub async fn logout(&mut self) -> Result<()> {
        if !self.is_authenticated() {
            self.end_session();
            return Ok(());
        }
        let result = self.call(endpoints::LOGOUT, &[]).await;
        self.end_session();
        info!("Logged out");
        result.map(|_| ())
    }

    // ===== Connection-level recipes =====

    async fn ensure_roles(&mut self) -> Result<()> {
        self.require_session()?;
        if !self.state.attempts.begin(ConnectionRecipe::Roles) {
            return Ok(());
        }
        match self.fetch(endpoints::ROLES, &[]).await? {
            Some(payload) => {
                let roles =
                    sections::apply_roles(&mut self.state.registry, endpoints::ROLES, &payload)?;
                self.state.default_section =
                    roles.default.or_else(|| roles.sections.first().copied());
                self.state.sections = Slot::Set(roles.sections);
            }
            None => self.state.sections.mark_unavailable(),
        }
        Ok(())
    }

    async fn ensure_terms(&mut self) -> Result<()> {
        self.require_session()?;
        if !self.state.attempts.begin(ConnectionRecipe::Terms) {
            return Ok(());
        }
        match self.fetch(endpoints::TERMS, &[]).await? {
            Some(payload) => {
                sections::apply_terms(&mut self.state.registry, endpoints::TERMS, &payload)
            }
            None => {
                for id in self.state.registry.section_ids() {
                    self.state.registry.section_mut(id).terms.mark_unavailable();
                }
                Ok(())
            }
        }
    }

    // ===== Sections =====

    /// Sections the user holds a role in.
    pub async fn sections(&mut self) -> Result<Vec<&Section>> {
        self.ensure_roles().await?;
        let ids = self.state.sections.get().cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.state.registry.section(id))
            .collect())
    }

    pub async fn section(&mut self, id: SectionId) -> Result<&Section> {
        self.ensure_roles().await?;
        Ok(&*self.state.registry.section_mut(id))
    }

    /// The section chosen with `set_current_section`, else the user's
    /// default section, else the first one.
    pub async fn current_section(&mut self) -> Result<Option<SectionId>> {
        if let Some(id) = self.state.current_section {
            return Ok(Some(id));
        }
        self.ensure_roles().await?;
        Ok(self.state.default_section)
    }

    pub fn set_current_section(&mut self, id: SectionId) {
        self.state.current_section = Some(id);
    }

    async fn section_type(&mut self, id: SectionId) -> Result<Option<SectionType>> {
        Ok(self.section(id).await?.section_type.get().copied())
    }

    fn claim_section(&mut self, id: SectionId, recipe: SectionRecipe) -> Result<bool> {
        self.require_session()?;
        Ok(self.state.registry.section_mut(id).attempts.begin(recipe))
    }

    /// What the section has granted this application.
    pub async fn api_permissions(&mut self, section: SectionId) -> Result<Option<&Permissions>> {
        if self.claim_section(section, SectionRecipe::ApiAccess)? {
            let params = [("sectionid", section.to_string())];
            match self.fetch(endpoints::API_ACCESS, &params).await? {
                Some(payload) => sections::apply_api_access(
                    &mut self.state.registry,
                    section,
                    &self.state.app_id,
                    endpoints::API_ACCESS,
                    &payload,
                )?,
                None => self
                    .state
                    .registry
                    .section_mut(section)
                    .api_permissions
                    .mark_unavailable(),
            }
        }
        Ok(self.state.registry.section_mut(section).api_permissions.get())
    }

    // ===== Terms =====

    pub async fn terms(&mut self, section: SectionId) -> Result<Vec<&Term>> {
        self.ensure_terms().await?;
        let ids = self
            .state
            .registry
            .section(section)
            .and_then(|s| s.terms.get().cloned())
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.state.registry.term(id))
            .collect())
    }

    /// The section's term in force on `date`.
    pub async fn term_at(&mut self, section: SectionId, date: NaiveDate) -> Result<Option<TermId>> {
        let spans: Vec<TermSpan> = self
            .terms(section)
            .await?
            .into_iter()
            .filter_map(TermSpan::of)
            .collect();
        Ok(calc::term_at(&spans, date))
    }

    pub async fn current_term(&mut self, section: SectionId) -> Result<Option<TermId>> {
        self.term_at(section, today()).await
    }

    async fn term_or_current(
        &mut self,
        section: SectionId,
        term: Option<TermId>,
    ) -> Result<Option<TermId>> {
        match term {
            Some(term) => Ok(Some(term)),
            None => self.current_term(section).await,
        }
    }

    // ===== Members =====

    async fn ensure_member_list(&mut self, section: SectionId, term: TermId) -> Result<()> {
        let section_type = self.section_type(section).await?;
        if !self.claim_section(section, SectionRecipe::Members(term))? {
            return Ok(());
        }
        let mut params = vec![("sectionid", section.to_string()), ("termid", term.to_string())];
        if let Some(section_type) = section_type {
            params.push(("section", section_type.as_api().to_string()));
        }
        if let Some(payload) = self.fetch(endpoints::MEMBER_LIST, &params).await? {
            members::apply_member_list(
                &mut self.state.registry,
                section,
                term,
                endpoints::MEMBER_LIST,
                &payload,
            )?;
        }
        Ok(())
    }

    /// Members of a section in a term (default: the current term).
    pub async fn members(
        &mut self,
        section: SectionId,
        term: Option<TermId>,
    ) -> Result<Vec<&Member>> {
        let Some(term) = self.term_or_current(section, term).await? else {
            return Ok(Vec::new());
        };
        self.ensure_member_list(section, term).await?;
        let ids = self
            .state
            .registry
            .section(section)
            .and_then(|s| s.members.get(&term).cloned())
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.state.registry.member(MemberKey::new(section, id)))
            .collect())
    }

    async fn ensure_member(&mut self, key: MemberKey, recipe: MemberRecipe) -> Result<()> {
        self.require_session()?;
        let term = match recipe {
            MemberRecipe::Individual => self.current_term(key.section).await?,
            MemberRecipe::CustomData => None,
        };
        if !self.state.registry.member_mut(key).attempts.begin(recipe) {
            return Ok(());
        }

        let supplied = match recipe {
            MemberRecipe::Individual => {
                let mut params = vec![
                    ("sectionid", key.section.to_string()),
                    ("scoutid", key.member.to_string()),
                    ("context", "members".to_string()),
                ];
                if let Some(term) = term {
                    params.push(("termid", term.to_string()));
                }
                match self.fetch(endpoints::INDIVIDUAL, &params).await? {
                    Some(payload) => members::apply_individual(
                        &mut self.state.registry,
                        key,
                        endpoints::INDIVIDUAL,
                        &payload,
                    )?,
                    None => false,
                }
            }
            MemberRecipe::CustomData => {
                let params = [
                    ("section_id", key.section.to_string()),
                    ("associated_id", key.member.to_string()),
                    ("associated_type", "member".to_string()),
                ];
                match self.fetch(endpoints::CUSTOM_DATA, &params).await? {
                    Some(payload) => {
                        members::apply_custom_data(
                            &mut self.state.registry,
                            key,
                            endpoints::CUSTOM_DATA,
                            &payload,
                        )?;
                        true
                    }
                    None => false,
                }
            }
        };
        if !supplied {
            self.state.registry.member_mut(key).mark_unavailable(recipe);
        }
        Ok(())
    }

    /// A member with `field` populated, running its recipe if that has not
    /// happened yet. Other fields are returned in whatever state they are.
    pub async fn member(&mut self, key: MemberKey, field: MemberField) -> Result<&Member> {
        let needs = self
            .state
            .registry
            .member(key)
            .map(|m| m.needs(field))
            .unwrap_or(true);
        if needs {
            self.ensure_member(key, field.recipe()).await?;
        }
        Ok(&*self.state.registry.member_mut(key))
    }

    pub async fn custom_data(&mut self, key: MemberKey) -> Result<Option<&CustomData>> {
        Ok(self
            .member(key, MemberField::CustomData)
            .await?
            .custom_data
            .get())
    }

    // ===== Patrols =====

    /// Patrols of a section, the reserved leaders patrols first.
    pub async fn patrols(&mut self, section: SectionId) -> Result<Vec<&Patrol>> {
        if self.claim_section(section, SectionRecipe::Patrols)? {
            let params = [("sectionid", section.to_string())];
            match self.fetch(endpoints::PATROLS, &params).await? {
                Some(payload) => sections::apply_patrols(
                    &mut self.state.registry,
                    section,
                    endpoints::PATROLS,
                    &payload,
                )?,
                None => self.state.registry.section_mut(section).patrols.mark_unavailable(),
            }
        }
        let ids = self
            .state
            .registry
            .section(section)
            .and_then(|s| s.patrols.get().cloned())
            .unwrap_or_else(|| vec![LEADERS_PATROL, YOUNG_LEADERS_PATROL]);
        Ok(ids
            .into_iter()
            .filter_map(|id| self.state.registry.patrol(section, id))
            .collect())
    }

    // ===== Badges =====

    /// Badges of one type available to a section in a term.
    pub async fn badges(
        &mut self,
        section: SectionId,
        term: Option<TermId>,
        badge_type: BadgeType,
    ) -> Result<Vec<&Badge>> {
        let Some(term) = self.term_or_current(section, term).await? else {
            return Ok(Vec::new());
        };
        let section_type = self.section_type(section).await?;
        if self.claim_section(section, SectionRecipe::Badges(term, badge_type))? {
            let mut params = vec![
                ("section_id", section.to_string()),
                ("term_id", term.to_string()),
                ("type_id", badge_type.type_id().to_string()),
            ];
            if let Some(section_type) = section_type {
                params.push(("section", section_type.as_api().to_string()));
            }
            if let Some(payload) = self.fetch(endpoints::BADGE_LIST, &params).await? {
                badges::apply_badge_list(
                    &mut self.state.registry,
                    section,
                    term,
                    badge_type,
                    endpoints::BADGE_LIST,
                    &payload,
                )?;
            }
        }

        let idvs = self
            .state
            .registry
            .section(section)
            .and_then(|s| s.badges.get(&term).cloned())
            .unwrap_or_default();
        Ok(idvs
            .into_iter()
            .filter_map(|idv| self.state.registry.badge(idv))
            .filter(|b| b.badge_type.get() == Some(&badge_type))
            .collect())
    }

    fn badge_params(
        section: SectionId,
        term: TermId,
        section_type: Option<SectionType>,
        idv: BadgeIdv,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("section_id", section.to_string()),
            ("term_id", term.to_string()),
            ("badge_id", idv.id.to_string()),
            ("badge_version", idv.version.to_string()),
        ];
        if let Some(section_type) = section_type {
            params.push(("section", section_type.as_api().to_string()));
        }
        params
    }

    /// A badge with its requirements populated.
    pub async fn badge(
        &mut self,
        section: SectionId,
        term: Option<TermId>,
        idv: BadgeIdv,
    ) -> Result<&Badge> {
        self.require_session()?;
        let needs = self
            .state
            .registry
            .badge(idv)
            .map(|b| !b.attempts.contains(&BadgeRecipe::Structure) && b.requirements.is_unset())
            .unwrap_or(true);
        if needs {
            let term = self.term_or_current(section, term).await?;
            let section_type = self.section_type(section).await?;
            if self.state.registry.badge_mut(idv).attempts.begin(BadgeRecipe::Structure) {
                let payload = match term {
                    Some(term) => {
                        let params = Self::badge_params(section, term, section_type, idv);
                        self.fetch(endpoints::BADGE_STRUCTURE, &params).await?
                    }
                    None => None,
                };
                match payload {
                    Some(payload) => badges::apply_badge_structure(
                        &mut self.state.registry,
                        idv,
                        endpoints::BADGE_STRUCTURE,
                        &payload,
                    )?,
                    None => self.state.registry.badge_mut(idv).requirements.mark_unavailable(),
                }
            }
        }
        Ok(&*self.state.registry.badge_mut(idv))
    }

    async fn ensure_badge_records(
        &mut self,
        section: SectionId,
        term: TermId,
        idv: BadgeIdv,
    ) -> Result<()> {
        let section_type = self.section_type(section).await?;
        if !self.claim_section(section, SectionRecipe::BadgeRecords(term, idv))? {
            return Ok(());
        }
        let params = Self::badge_params(section, term, section_type, idv);
        if let Some(payload) = self.fetch(endpoints::BADGE_RECORDS, &params).await? {
            badges::apply_badge_records(
                &mut self.state.registry,
                section,
                idv,
                endpoints::BADGE_RECORDS,
                &payload,
            )?;
        }
        Ok(())
    }

    /// One member's work on a badge.
    pub async fn badge_work(
        &mut self,
        key: MemberKey,
        term: Option<TermId>,
        idv: BadgeIdv,
    ) -> Result<Option<&BadgeWork>> {
        if let Some(term) = self.term_or_current(key.section, term).await? {
            self.ensure_badge_records(key.section, term, idv).await?;
        }
        Ok(self
            .state
            .registry
            .member(key)
            .and_then(|m| m.badge_work.get(&idv)))
    }

    /// Met and skippable state of every requirement of a badge for one member.
    pub async fn requirement_status(
        &mut self,
        key: MemberKey,
        term: Option<TermId>,
        idv: BadgeIdv,
    ) -> Result<Vec<RequirementStatus>> {
        let section_type = self.section_type(key.section).await?;
        self.badge(key.section, term, idv).await?;
        self.badge_work(key, term, idv).await?;

        let registry = &self.state.registry;
        let Some(badge) = registry.badge(idv) else {
            return Ok(Vec::new());
        };
        let work = registry.member(key).and_then(|m| m.badge_work.get(&idv));
        Ok(calc::requirement_report(SkipRules::builtin(), section_type, badge, work))
    }

    // ===== Events =====

    /// Events of a section in a term (default: the current term).
    pub async fn events(
        &mut self,
        section: SectionId,
        term: Option<TermId>,
    ) -> Result<Vec<&Event>> {
        let Some(term) = self.term_or_current(section, term).await? else {
            return Ok(Vec::new());
        };
        if self.claim_section(section, SectionRecipe::Events(term))? {
            let params = [("sectionid", section.to_string()), ("termid", term.to_string())];
            if let Some(payload) = self.fetch(endpoints::EVENT_SUMMARY, &params).await? {
                events::apply_event_summary(
                    &mut self.state.registry,
                    section,
                    term,
                    endpoints::EVENT_SUMMARY,
                    &payload,
                )?;
            }
        }
        let ids = self
            .state
            .registry
            .section(section)
            .and_then(|s| s.events.get(&term).cloned())
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.state.registry.event(id))
            .collect())
    }

    async fn ensure_event(&mut self, id: EventId, recipe: EventRecipe) -> Result<()> {
        self.require_session()?;
        let (section, start) = match self.state.registry.event(id) {
            Some(event) if event.attempts.contains(&recipe) => return Ok(()),
            Some(event) => (event.section_id.get().copied(), event.start.get().copied()),
            None => (None, None),
        };
        let Some(section) = section else {
            // Events are only reachable through a section's list or sharing
            warn!(event = id, ?recipe, "Event has no known owning section");
            let event = self.state.registry.event_mut(id);
            event.attempts.begin(recipe);
            event.mark_unavailable(recipe);
            return Ok(());
        };
        let term = match recipe {
            EventRecipe::Attendance => self.term_at(section, start.unwrap_or_else(today)).await?,
            _ => None,
        };
        if !self.state.registry.event_mut(id).attempts.begin(recipe) {
            return Ok(());
        }

        let mut params = vec![("sectionid", section.to_string()), ("eventid", id.to_string())];
        let endpoint = match recipe {
            EventRecipe::Detail => endpoints::EVENT_DETAIL,
            EventRecipe::Attendance => {
                if let Some(term) = term {
                    params.push(("termid", term.to_string()));
                }
                endpoints::ATTENDANCE
            }
            EventRecipe::Sharing => endpoints::SHARING,
        };
        let Some(payload) = self.fetch(endpoint, &params).await? else {
            self.state.registry.event_mut(id).mark_unavailable(recipe);
            return Ok(());
        };
        let registry = &mut self.state.registry;
        match recipe {
            EventRecipe::Detail => events::apply_event_detail(registry, id, endpoint, &payload),
            EventRecipe::Attendance => {
                events::apply_attendance(registry, id, section, endpoint, &payload)
            }
            EventRecipe::Sharing => {
                events::apply_sharing(registry, id, endpoint, &payload).map(|_| ())
            }
        }
    }

    /// An event with its full record populated.
    pub async fn event(&mut self, id: EventId) -> Result<&Event> {
        let needs = self
            .state
            .registry
            .event(id)
            .map(|e| e.notes.is_unset())
            .unwrap_or(true);
        if needs {
            self.ensure_event(id, EventRecipe::Detail).await?;
        }
        Ok(&*self.state.registry.event_mut(id))
    }

    /// Attendance of an event, keyed by member id in the owning section.
    pub async fn attendance(
        &mut self,
        id: EventId,
    ) -> Result<Option<&BTreeMap<MemberId, EventAttendance>>> {
        self.ensure_event(id, EventRecipe::Attendance).await?;
        Ok(self.state.registry.event(id).and_then(|e| e.attendance.get()))
    }

    /// Equivalent events shared into other sections.
    pub async fn linked_events(&mut self, id: EventId) -> Result<Vec<&Event>> {
        self.ensure_event(id, EventRecipe::Sharing).await?;
        let links = self
            .state
            .registry
            .event(id)
            .and_then(|e| e.links.get().cloned())
            .unwrap_or_default();
        Ok(links
            .into_iter()
            .filter_map(|id| self.state.registry.event(id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_error_shapes() {
        let plain = remote_error(&json!("Invalid section")).unwrap();
        assert_eq!(plain.message, "Invalid section");

        let structured =
            remote_error(&json!({"code": "access-error-2", "message": "No permission"})).unwrap();
        assert_eq!(structured.code, "access-error-2");

        assert!(remote_error(&json!("")).is_none());
        assert!(remote_error(&json!(false)).is_none());
        assert!(remote_error(&json!({})).is_none());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = Credentials {
            user_id: "12".to_string(),
            secret: "hunter2".to_string(),
            email: "leader@example.com".to_string(),
        };
        let shown = format!("{:?}", credentials);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("leader@example.com"));
    }
}
