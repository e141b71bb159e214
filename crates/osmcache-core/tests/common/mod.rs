//! A scripted transport: canned payloads per endpoint, with every call
//! recorded so tests can count remote traffic.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use osmcache_core::api::{endpoints, FormParams, Result, Transport};
use osmcache_core::{ClientConfig, Connection};

#[derive(Default)]
struct Script {
    responses: HashMap<String, Value>,
    calls: Vec<(String, FormParams)>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every later call to `endpoint` with `payload`. Unscripted
    /// endpoints answer `null`.
    pub fn respond(&self, endpoint: &str, payload: Value) -> &Self {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(endpoint.to_string(), payload);
        self
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(e, _)| e == endpoint)
            .count()
    }

    pub fn total(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    /// Form of the most recent call to `endpoint`.
    pub fn last_form(&self, endpoint: &str) -> Option<FormParams> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .rev()
            .find(|(e, _)| e == endpoint)
            .map(|(_, form)| form.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, endpoint: &str, form: &FormParams) -> Result<Value> {
        let mut script = self.script.lock().unwrap();
        script.calls.push((endpoint.to_string(), form.clone()));
        Ok(script.responses.get(endpoint).cloned().unwrap_or(Value::Null))
    }
}

pub fn form_value<'a>(form: &'a FormParams, key: &str) -> Option<&'a str> {
    form.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

pub fn config() -> ClientConfig {
    ClientConfig {
        app_id: "42".to_string(),
        app_token: "app-token".to_string(),
        ..ClientConfig::default()
    }
}

/// Payloads for one Cubs section (100) with one term and two members.
pub fn cubs_script() -> ScriptedTransport {
    let transport = ScriptedTransport::new();
    transport
        .respond(endpoints::AUTHORISE, json!({"userid": "12", "secret": "user-secret"}))
        .respond(
            endpoints::ROLES,
            json!([{
                "sectionid": "100", "sectionname": "Red Cubs", "section": "cubs",
                "groupname": "1st Town", "groupid": 9, "isDefault": "1",
                "permissions": {"badge": 20, "member": 10}
            }]),
        )
        .respond(
            endpoints::TERMS,
            json!({"100": [
                {"termid": "1", "sectionid": "100", "name": "Autumn",
                 "startdate": "2026-09-01", "enddate": "2026-12-20"}
            ]}),
        )
        .respond(
            endpoints::MEMBER_LIST,
            json!({"items": [
                {"scoutid": "7", "firstname": "Jo", "lastname": "Smith", "dob": "2016-05-01",
                 "patrolid": "12", "patrol": "Red Six", "patrol_role_level": "2", "active": true},
                {"scoutid": 8, "firstname": "Sam", "lastname": "Jones", "patrolid": "-2",
                 "patrol": "Leaders", "active": "1"}
            ]}),
        );
    transport
}

pub async fn logged_in(transport: &ScriptedTransport) -> Connection {
    let mut connection = Connection::new(&config(), Box::new(transport.clone())).unwrap();
    assert!(connection.login("leader@example.com", "pw").await.unwrap());
    connection
}
