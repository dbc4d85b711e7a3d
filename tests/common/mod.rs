#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chatlink::{
    ApiError, AuthGrant, AuthKind, AuthToken, Backend, ChatClient, ChatConfig, ChatEvent, ContactSnapshot,
    Credentials, Message, MessageId, MessagePayload, ProfilePatch, PushEvent, PushIdentity, PushStream,
    PushTransport, ReconnectPolicy, TransportError, User, UserId,
};
use futures_util::{stream, StreamExt};
use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc, oneshot};

pub fn user(id: &str, name: &str) -> User {
    User {
        id: UserId::from(id),
        full_name: name.to_owned(),
        avatar: None,
        bio: None,
    }
}

pub fn message(id: &str, from: &str, to: &str, text: &str) -> Message {
    Message {
        id: MessageId::new(id),
        sender: UserId::from(from),
        recipient: UserId::from(to),
        text: Some(text.to_owned()),
        image: None,
        created_at: OffsetDateTime::now_utc(),
    }
}

fn status(status: u16, message: &str) -> ApiError {
    ApiError::Status {
        status,
        message: message.to_owned(),
    }
}

struct Account {
    password: String,
    user: User,
}

/// In-memory stand-in for the chat service.
#[derive(Default)]
pub struct FakeBackend {
    accounts: Mutex<HashMap<String, Account>>,
    contacts: Mutex<ContactSnapshot>,
    histories: Mutex<HashMap<UserId, Vec<Message>>>,
    gates: Mutex<HashMap<UserId, oneshot::Receiver<()>>>,
    sent: Mutex<Vec<(UserId, MessagePayload)>>,
    fail_sends: AtomicBool,
    fail_history: AtomicBool,
    next_id: AtomicUsize,
    pub auth_calls: AtomicUsize,
    pub contact_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_account(&self, email: &str, password: &str, user: User) {
        self.accounts.lock().unwrap().insert(
            email.to_owned(),
            Account {
                password: password.to_owned(),
                user,
            },
        );
    }

    pub fn set_contacts(&self, users: Vec<User>, unseen: &[(&str, u32)]) {
        *self.contacts.lock().unwrap() = ContactSnapshot {
            users,
            unseen: unseen.iter().map(|(id, n)| (UserId::from(*id), *n)).collect(),
        };
    }

    pub fn set_history(&self, with: &str, messages: Vec<Message>) {
        self.histories.lock().unwrap().insert(UserId::from(with), messages);
    }

    /// The next history fetch for `with` waits until the returned sender
    /// fires.
    pub fn gate_history(&self, with: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(UserId::from(with), rx);
        tx
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(UserId, MessagePayload)> {
        self.sent.lock().unwrap().clone()
    }

    fn user_for(&self, token: &AuthToken) -> Result<User, ApiError> {
        let id = token
            .secret()
            .strip_prefix("tok-")
            .ok_or_else(|| status(401, "bad token"))?;
        self.accounts
            .lock()
            .unwrap()
            .values()
            .find(|account| account.user.id.as_str() == id)
            .map(|account| account.user.clone())
            .ok_or_else(|| status(401, "unknown user"))
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn authenticate(&self, kind: AuthKind, credentials: &Credentials) -> Result<AuthGrant, ApiError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        let mut accounts = self.accounts.lock().unwrap();
        let user = match kind {
            AuthKind::Login => match accounts.get(&credentials.email) {
                Some(account) if account.password == credentials.password => account.user.clone(),
                _ => return Err(status(401, "Invalid credentials")),
            },
            AuthKind::Signup => {
                if accounts.contains_key(&credentials.email) {
                    return Err(status(409, "Account already exists"));
                }
                let user = User {
                    id: UserId::new(format!("u{}", accounts.len() + 1)),
                    full_name: credentials.full_name.clone().unwrap_or_default(),
                    avatar: None,
                    bio: credentials.bio.clone(),
                };
                accounts.insert(
                    credentials.email.clone(),
                    Account {
                        password: credentials.password.clone(),
                        user: user.clone(),
                    },
                );
                user
            }
        };
        let token = AuthToken::new(format!("tok-{}", user.id));
        Ok(AuthGrant { user, token })
    }

    async fn fetch_profile(&self, token: &AuthToken) -> Result<User, ApiError> {
        self.user_for(token)
    }

    async fn update_profile(&self, token: &AuthToken, patch: &ProfilePatch) -> Result<User, ApiError> {
        let me = self.user_for(token)?;
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .values_mut()
            .find(|account| account.user.id == me.id)
            .ok_or_else(|| status(404, "gone"))?;
        if let Some(name) = &patch.full_name {
            account.user.full_name = name.clone();
        }
        if let Some(bio) = &patch.bio {
            account.user.bio = Some(bio.clone());
        }
        if let Some(pic) = &patch.profile_pic {
            account.user.avatar = Some(pic.clone());
        }
        Ok(account.user.clone())
    }

    async fn fetch_contacts(&self, token: &AuthToken) -> Result<ContactSnapshot, ApiError> {
        self.user_for(token)?;
        self.contact_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.contacts.lock().unwrap().clone())
    }

    async fn fetch_history(&self, token: &AuthToken, with: &UserId) -> Result<Vec<Message>, ApiError> {
        self.user_for(token)?;
        let gate = self.gates.lock().unwrap().remove(with);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(status(503, "history unavailable"));
        }
        Ok(self.histories.lock().unwrap().get(with).cloned().unwrap_or_default())
    }

    async fn post_message(
        &self,
        token: &AuthToken,
        to: &UserId,
        payload: &MessagePayload,
    ) -> Result<Message, ApiError> {
        let me = self.user_for(token)?;
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(status(500, "storage unavailable"));
        }
        self.sent.lock().unwrap().push((to.clone(), payload.clone()));
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Message {
            id: MessageId::new(format!("sent-{n}")),
            sender: me.id,
            recipient: to.clone(),
            text: payload.text.clone(),
            image: payload.image.clone(),
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

pub type PushSender = mpsc::UnboundedSender<Result<PushEvent, TransportError>>;

/// Hands out one scripted stream per queued connection; connecting with
/// nothing queued fails.
#[derive(Default)]
pub struct FakeTransport {
    queued: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<PushEvent, TransportError>>>>,
    pub connects: AtomicUsize,
    pub identities: Mutex<Vec<UserId>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_connection(&self) -> PushSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queued.lock().unwrap().push_back(rx);
        tx
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn connect(&self, identity: &PushIdentity) -> Result<PushStream, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.identities.lock().unwrap().push(identity.user_id.clone());
        let rx = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Connect("nobody listening".to_owned()))?;
        let events = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
        Ok(events.boxed())
    }
}

pub fn test_config() -> ChatConfig {
    ChatConfig {
        reconnect: ReconnectPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            stable_after: Duration::from_millis(50),
        },
        refresh_contacts_on_presence: false,
        ..ChatConfig::default()
    }
}

pub fn client(backend: &Arc<FakeBackend>, transport: &Arc<FakeTransport>, config: ChatConfig) -> ChatClient {
    ChatClient::new(backend.clone(), transport.clone(), config)
}

/// Waits for the first event matching `pred`, skipping the rest.
pub async fn wait_for(
    events: &mut broadcast::Receiver<ChatEvent>,
    pred: impl Fn(&ChatEvent) -> bool,
) -> ChatEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event feed closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Backend with `me@chat` (id `me`) plus contacts Alice (`a`) and Bob (`b`).
pub fn standard_backend() -> Arc<FakeBackend> {
    let backend = FakeBackend::new();
    backend.add_account("me@chat", "hunter2", user("me", "Me"));
    backend.add_account("alice@chat", "pw", user("a", "Alice"));
    backend.add_account("bob@chat", "pw", user("b", "Bob"));
    backend.set_contacts(vec![user("a", "Alice"), user("b", "Bob")], &[]);
    backend
}

pub fn my_credentials() -> Credentials {
    Credentials::login("me@chat", "hunter2")
}
