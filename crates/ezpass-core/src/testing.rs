//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use ezpass_protocols::{
    CredentialAnswer, CredentialRecord, CredentialService, FieldLocator, HostContext, OriginKey,
    Role, SyncError, UserPrompt,
};

use crate::snapshot::SnapshotDocument;

/// Credential service that answers from a script and records every call.
#[derive(Default)]
pub struct RecordingService {
    pub answers: Mutex<VecDeque<Result<CredentialAnswer, SyncError>>>,
    pub save_result: Mutex<Option<SyncError>>,
    pub fetches: Mutex<Vec<OriginKey>>,
    pub saved: Mutex<Vec<CredentialRecord>>,
    pub preferences: Mutex<Vec<(OriginKey, FieldLocator, Role)>>,
}

impl RecordingService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_answer(&self, answer: CredentialAnswer) {
        self.answers.lock().push_back(Ok(answer));
    }

    pub fn push_error(&self, err: SyncError) {
        self.answers.lock().push_back(Err(err));
    }

    pub fn fail_saves(&self, err: SyncError) {
        *self.save_result.lock() = Some(err);
    }
}

#[async_trait]
impl CredentialService for RecordingService {
    async fn request_credentials(&self, origin: &OriginKey) -> Result<CredentialAnswer, SyncError> {
        self.fetches.lock().push(origin.clone());
        self.answers
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(CredentialAnswer::default()))
    }

    async fn save_credential(&self, record: CredentialRecord) -> Result<(), SyncError> {
        // Yield so concurrent callers can interleave.
        tokio::task::yield_now().await;
        if let Some(err) = self.save_result.lock().clone() {
            return Err(err);
        }
        self.saved.lock().push(record);
        Ok(())
    }

    async fn save_preference(
        &self,
        origin: &OriginKey,
        locator: &FieldLocator,
        role: Role,
    ) -> Result<(), SyncError> {
        if let Some(err) = self.save_result.lock().clone() {
            return Err(err);
        }
        self.preferences
            .lock()
            .push((origin.clone(), locator.clone(), role));
        Ok(())
    }
}

/// Prompt with scripted replies; records warnings and shown choices.
pub struct ScriptedPrompt {
    pub confirm: bool,
    pub choices: Mutex<VecDeque<Option<usize>>>,
    pub shown: Mutex<Vec<Vec<String>>>,
    pub confirmations: Mutex<Vec<OriginKey>>,
    pub warnings: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn confirming(confirm: bool) -> Arc<Self> {
        Arc::new(Self {
            confirm,
            choices: Mutex::new(VecDeque::new()),
            shown: Mutex::new(Vec::new()),
            confirmations: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
        })
    }

    pub fn choosing(choices: &[Option<usize>]) -> Arc<Self> {
        let prompt = Self::confirming(true);
        prompt.choices.lock().extend(choices.iter().copied());
        prompt
    }
}

#[async_trait]
impl UserPrompt for ScriptedPrompt {
    async fn confirm_save(&self, origin: &OriginKey) -> bool {
        self.confirmations.lock().push(origin.clone());
        self.confirm
    }

    async fn choose_account(&self, labels: &[String]) -> Option<usize> {
        self.shown.lock().push(labels.to_vec());
        self.choices.lock().pop_front().flatten()
    }

    fn warn_user(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }
}

/// Host context that can be invalidated mid-test.
#[derive(Default)]
pub struct ToggleContext {
    pub invalid: std::sync::atomic::AtomicBool,
}

impl ToggleContext {
    pub fn invalidate(&self) {
        self.invalid.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl HostContext for ToggleContext {
    fn is_valid(&self) -> bool {
        !self.invalid.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Login page with `#u` (text) and `#p` (password) inside a form.
pub fn login_page(url: &str) -> Arc<SnapshotDocument> {
    let json = format!(
        r#"{{"url":"{}","body":{{"tag":"body","children":[
            {{"tag":"form","classes":["login"],"children":[
                {{"tag":"input","attributes":{{"id":"u","type":"text"}}}},
                {{"tag":"input","attributes":{{"id":"p","type":"password"}}}},
                {{"tag":"input","classes":["remember"],"attributes":{{"type":"checkbox"}}}}
            ]}},
            {{"tag":"div","attributes":{{"id":"banner"}},"children":[
                {{"tag":"span","attributes":{{"id":"badge"}}}}
            ]}}
        ]}}}}"#,
        url
    );
    match SnapshotDocument::from_json(&json) {
        Ok(doc) => Arc::new(doc),
        Err(e) => panic!("bad fixture: {}", e),
    }
}

pub fn answer(username: &str, password: &str) -> CredentialAnswer {
    CredentialAnswer {
        preferences: vec![
            ezpass_protocols::RoleAssignment::new(Role::Username, FieldLocator::new("#u")),
            ezpass_protocols::RoleAssignment::new(Role::Password, FieldLocator::new("#p")),
        ],
        username_email: Some(username.to_string()),
        password: Some(password.to_string()),
        multiple_accounts: None,
    }
}
