//! Shared fakes for engine tests.
//!
//! `FakeMailu` implements every API family with scripted replies and
//! records each call. `JournalStore` wraps the in-memory store and records
//! marker and status writes into the same journal, so tests can assert the
//! relative order of store writes and remote calls.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mailu_client::{
    Alias, AliasApi, ApiResponse, ClientError, ClientResult, Domain, DomainApi, StatusCode, User,
    UserApi,
};
use mailu_reconcile::conditions::Conditions;
use mailu_reconcile::store::{
    InMemoryStore, ManagedResource, ObjectKey, OwnershipMarker, ResourceStore, DEFAULT_NAMESPACE,
};
use mailu_reconcile::StoreResult;
use serde_json::Value;

/// Remote operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Find,
    Create,
    Update,
    Delete,
    DeleteAlternative,
}

/// A recorded remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Find(String),
    Create(Value),
    Update(String, Value),
    Delete(String),
    DeleteAlternative(String),
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::Find(_) => Op::Find,
            Call::Create(_) => Op::Create,
            Call::Update(..) => Op::Update,
            Call::Delete(_) => Op::Delete,
            Call::DeleteAlternative(_) => Op::DeleteAlternative,
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Call::Find(_))
    }
}

/// Anything observable that happened during a reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Api(Call),
    Marker(OwnershipMarker),
    Status,
}

pub type Journal = Arc<Mutex<Vec<Event>>>;

/// Scripted reply for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Transport,
    /// The call panics.
    Panic,
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Status(200, String::new())
    }

    pub fn status(code: u16) -> Self {
        Reply::Status(code, String::new())
    }

    pub fn json(code: u16, value: Value) -> Self {
        Reply::Status(code, value.to_string())
    }

    fn into_result(self) -> ClientResult<ApiResponse> {
        match self {
            Reply::Status(code, body) => Ok(ApiResponse::new(
                StatusCode::from_u16(code).unwrap(),
                body,
            )),
            Reply::Transport => Err(ClientError::Transport {
                message: "connection refused".to_string(),
                source: None,
            }),
            Reply::Panic => panic!("scripted panic"),
        }
    }
}

/// Scripted Mailu API.
///
/// Queued replies are used first; once a queue is empty the default for
/// that operation applies (404 for find, 200 for everything else).
pub struct FakeMailu {
    journal: Journal,
    queued: Mutex<HashMap<Op, VecDeque<Reply>>>,
    defaults: Mutex<HashMap<Op, Reply>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeMailu {
    pub fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            journal,
            queued: Mutex::new(HashMap::new()),
            defaults: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Most calls that were ever in progress at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn respond(&self, call: Call) -> ClientResult<ApiResponse> {
        let latency = *self.latency.lock().unwrap();
        let Some(latency) = latency else {
            return self.reply(call);
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.reply(call)
    }

    /// Queue a one-shot reply.
    pub fn push(&self, op: Op, reply: Reply) {
        self.queued
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(reply);
    }

    /// Set the reply used once the queue for `op` is drained.
    pub fn set_default(&self, op: Op, reply: Reply) {
        self.defaults.lock().unwrap().insert(op, reply);
    }

    /// Make find return `entity` from now on.
    pub fn serve<T: serde::Serialize>(&self, entity: &T) {
        self.set_default(Op::Find, Reply::json(200, serde_json::to_value(entity).unwrap()));
    }

    fn reply(&self, call: Call) -> ClientResult<ApiResponse> {
        let op = call.op();
        self.journal.lock().unwrap().push(Event::Api(call));

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        let reply = queued.unwrap_or_else(|| {
            self.defaults
                .lock()
                .unwrap()
                .get(&op)
                .cloned()
                .unwrap_or(match op {
                    Op::Find => Reply::status(404),
                    _ => Reply::ok(),
                })
        });
        reply.into_result()
    }
}

#[async_trait]
impl DomainApi for FakeMailu {
    async fn find_domain(&self, name: &str) -> ClientResult<ApiResponse> {
        self.respond(Call::Find(name.to_string())).await
    }

    async fn create_domain(&self, domain: &Domain) -> ClientResult<ApiResponse> {
        self.respond(Call::Create(serde_json::to_value(domain).unwrap())).await
    }

    async fn update_domain(&self, name: &str, domain: &Domain) -> ClientResult<ApiResponse> {
        self.respond(Call::Update(name.to_string(), serde_json::to_value(domain).unwrap())).await
    }

    async fn delete_domain(&self, name: &str) -> ClientResult<ApiResponse> {
        self.respond(Call::Delete(name.to_string())).await
    }

    async fn delete_alternative(&self, name: &str) -> ClientResult<ApiResponse> {
        self.respond(Call::DeleteAlternative(name.to_string())).await
    }
}

#[async_trait]
impl UserApi for FakeMailu {
    async fn find_user(&self, email: &str) -> ClientResult<ApiResponse> {
        self.respond(Call::Find(email.to_string())).await
    }

    async fn create_user(&self, user: &User) -> ClientResult<ApiResponse> {
        self.respond(Call::Create(serde_json::to_value(user).unwrap())).await
    }

    async fn update_user(&self, email: &str, user: &User) -> ClientResult<ApiResponse> {
        self.respond(Call::Update(email.to_string(), serde_json::to_value(user).unwrap())).await
    }

    async fn delete_user(&self, email: &str) -> ClientResult<ApiResponse> {
        self.respond(Call::Delete(email.to_string())).await
    }
}

#[async_trait]
impl AliasApi for FakeMailu {
    async fn find_alias(&self, email: &str) -> ClientResult<ApiResponse> {
        self.respond(Call::Find(email.to_string())).await
    }

    async fn create_alias(&self, alias: &Alias) -> ClientResult<ApiResponse> {
        self.respond(Call::Create(serde_json::to_value(alias).unwrap())).await
    }

    async fn update_alias(&self, email: &str, alias: &Alias) -> ClientResult<ApiResponse> {
        self.respond(Call::Update(email.to_string(), serde_json::to_value(alias).unwrap())).await
    }

    async fn delete_alias(&self, email: &str) -> ClientResult<ApiResponse> {
        self.respond(Call::Delete(email.to_string())).await
    }
}

/// In-memory store that journals its writes.
pub struct JournalStore<S> {
    pub inner: InMemoryStore<S>,
    journal: Journal,
}

impl<S: Clone + Send + Sync> JournalStore<S> {
    pub fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStore::new(),
            journal,
        })
    }

    /// Submit a spec under the default namespace.
    pub async fn submit(&self, name: &str, spec: S) -> ObjectKey {
        let key = ObjectKey::new(DEFAULT_NAMESPACE, name);
        self.inner.apply(key.clone(), spec, BTreeMap::new()).await;
        key
    }

    /// Current stored object.
    pub async fn current(&self, key: &ObjectKey) -> Option<ManagedResource<S>> {
        self.inner.get(key).await.unwrap()
    }
}

#[async_trait]
impl<S: Clone + Send + Sync> ResourceStore<S> for JournalStore<S> {
    async fn get(&self, key: &ObjectKey) -> StoreResult<Option<ManagedResource<S>>> {
        self.inner.get(key).await
    }

    async fn list_keys(&self) -> StoreResult<Vec<ObjectKey>> {
        self.inner.list_keys().await
    }

    async fn patch_marker(&self, key: &ObjectKey, marker: OwnershipMarker) -> StoreResult<()> {
        self.journal.lock().unwrap().push(Event::Marker(marker));
        self.inner.patch_marker(key, marker).await
    }

    async fn patch_status(&self, key: &ObjectKey, conditions: &Conditions) -> StoreResult<()> {
        self.journal.lock().unwrap().push(Event::Status);
        self.inner.patch_status(key, conditions).await
    }
}

pub fn new_journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Snapshot of the journal, then clear it.
pub fn drain(journal: &Journal) -> Vec<Event> {
    std::mem::take(&mut *journal.lock().unwrap())
}

/// Remote calls in the journal.
pub fn calls(events: &[Event]) -> Vec<Call> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Api(call) => Some(call.clone()),
            _ => None,
        })
        .collect()
}

/// Number of remote calls of one kind.
pub fn count(events: &[Event], op: Op) -> usize {
    calls(events).iter().filter(|c| c.op() == op).count()
}

/// Number of status writes.
pub fn status_writes(events: &[Event]) -> usize {
    events.iter().filter(|e| **e == Event::Status).count()
}
