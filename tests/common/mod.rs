#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use compound_hub::config::{Config, ConfigLoader, ResolvedConfig};
use compound_hub::error::HubError;
use compound_hub::http::{HttpBackend, HttpSession, RawResponse, SessionProfile};

#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    Text(u16, String),
    Fail(String),
}

#[derive(Default)]
struct Script {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
    profiles: Mutex<Vec<SessionProfile>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

/// In-memory upstream. Replies are queued per exact URL; the last reply for a
/// URL repeats once the queue is down to it. Unknown URLs fail as transport
/// errors.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, url: impl Into<String>, reply: Reply) -> &Self {
        self.script
            .routes
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn json(&self, url: impl Into<String>, body: Value) -> &Self {
        self.on(url, Reply::Json(200, body))
    }

    pub fn with_latency(&self, latency: Duration) -> &Self {
        *self.script.latency.lock().unwrap() = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == url).count()
    }

    pub fn sessions_opened(&self) -> Vec<SessionProfile> {
        self.script.profiles.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.script.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn shared(&self) -> Arc<dyn HttpBackend> {
        Arc::new(self.clone())
    }
}

impl HttpBackend for ScriptedBackend {
    fn open(&self, profile: &SessionProfile) -> Result<Box<dyn HttpSession>, HubError> {
        self.script.profiles.lock().unwrap().push(profile.clone());
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Script>,
}

#[async_trait]
impl HttpSession for ScriptedSession {
    async fn get(&self, url: &str) -> Result<RawResponse, HubError> {
        self.script.calls.lock().unwrap().push(url.to_string());
        let now = self.script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.script.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = *self.script.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let reply = {
            let mut routes = self.script.routes.lock().unwrap();
            routes.get_mut(url).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };
        self.script.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some(Reply::Json(status, body)) => Ok(RawResponse {
                status,
                body: body.to_string(),
            }),
            Some(Reply::Text(status, body)) => Ok(RawResponse { status, body }),
            Some(Reply::Fail(message)) => Err(HubError::Transport {
                url: url.to_string(),
                message,
            }),
            None => Err(HubError::Transport {
                url: url.to_string(),
                message: "no scripted reply".to_string(),
            }),
        }
    }
}

pub const PUBCHEM: &str = "http://pubchem.test/rest/pug";
pub const MASSBANK: &str = "http://massbank.test/records";
pub const HMDB: &str = "http://hmdb.test/search";

/// Defaults pointed at the scripted hosts, with instant polling.
pub fn test_config() -> ResolvedConfig {
    let raw = serde_json::json!({
        "pubchem": {
            "base_url": PUBCHEM,
            "poll_interval_secs": 2,
            "poll_max_attempts": 5
        },
        "massbank": { "base_url": MASSBANK },
        "hmdb": { "base_url": HMDB }
    });
    let config: Config = serde_json::from_value(raw).unwrap();
    ConfigLoader::resolve_config(config, None).unwrap()
}

pub fn pubchem_cids(cids: &[u64]) -> Value {
    serde_json::json!({"IdentifierList": {"CID": cids}})
}

pub fn pubchem_properties(formula: &str, weight: &str, name: &str) -> Value {
    serde_json::json!({"PropertyTable": {"Properties": [{
        "MolecularFormula": formula,
        "MolecularWeight": weight,
        "IUPACName": name
    }]}})
}

pub fn pubchem_detail_url(cid: u64) -> String {
    format!("{PUBCHEM}/compound/cid/{cid}/property/MolecularFormula,MolecularWeight,IUPACName,Title/JSON")
}

pub fn massbank_hits(accessions: &[&str]) -> Value {
    let data: Vec<Value> = accessions
        .iter()
        .map(|accession| serde_json::json!({"accession": accession}))
        .collect();
    serde_json::json!({"data": data})
}

pub fn massbank_detail(name: &str, formula: &str, mass: f64) -> Value {
    serde_json::json!({"compound": {"names": [name], "formula": formula, "mass": mass}})
}
