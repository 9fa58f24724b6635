//! Scripted test doubles for the Vault and Keybase ports.
//!
//! `MockVault` answers from per-endpoint scripts (queues for multi-round
//! protocols, single values elsewhere) and records every call so tests can
//! assert on ordering and cancellation behavior.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::api::VaultApi;
use crate::error::VaultError;
use crate::keybase::{KeybaseError, PgpKeySource};
use crate::types::{
    GenerateRootStatusResponse, InitRequest, InitResponse, LeaderResponse, RaftJoinRequest,
    RaftJoinResponse, RekeyInitRequest, RekeyStatusResponse, RekeyUpdateResponse, Secret,
    SealStatusResponse, SecretAuth, TokenCreateRequest,
};

#[derive(Default)]
pub(crate) struct MockVault {
    pub initialized: Mutex<bool>,
    /// Popped per `seal_status` call; falls back to `default_seal_status`.
    pub seal_statuses: Mutex<VecDeque<SealStatusResponse>>,
    pub default_seal_status: Mutex<SealStatusResponse>,
    pub init_response: Mutex<InitResponse>,
    pub unseal_responses: Mutex<VecDeque<SealStatusResponse>>,
    pub rekey_status: Mutex<RekeyStatusResponse>,
    pub rekey_init_response: Mutex<RekeyStatusResponse>,
    /// Err entries become `VaultError::Api` with the given status/message.
    pub rekey_updates: Mutex<VecDeque<Result<RekeyUpdateResponse, (u16, String)>>>,
    pub generate_root_init_response: Mutex<GenerateRootStatusResponse>,
    pub generate_root_updates: Mutex<VecDeque<GenerateRootStatusResponse>>,
    pub raft_join_response: Mutex<RaftJoinResponse>,
    pub logical_reads: Mutex<HashMap<String, serde_json::Value>>,

    pub calls: Mutex<Vec<String>>,
    pub writes: Mutex<Vec<(String, serde_json::Value)>>,
    pub orphan_requests: Mutex<Vec<TokenCreateRequest>>,
    pub token: Mutex<String>,
    pub token_history: Mutex<Vec<String>>,
}

impl MockVault {
    pub fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_owned());
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn write_paths(&self) -> Vec<String> {
        self.writes.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

fn api_error((status, message): (u16, String)) -> VaultError {
    VaultError::Api {
        status,
        path: "mock".to_owned(),
        message,
    }
}

#[async_trait::async_trait]
impl VaultApi for MockVault {
    async fn init_status(&self) -> Result<bool, VaultError> {
        self.record("init_status");
        Ok(*self.initialized.lock().unwrap())
    }

    async fn seal_status(&self) -> Result<SealStatusResponse, VaultError> {
        self.record("seal_status");
        let popped = self.seal_statuses.lock().unwrap().pop_front();
        Ok(popped.unwrap_or_else(|| self.default_seal_status.lock().unwrap().clone()))
    }

    async fn init(&self, _request: &InitRequest) -> Result<InitResponse, VaultError> {
        self.record("init");
        *self.initialized.lock().unwrap() = true;
        Ok(self.init_response.lock().unwrap().clone())
    }

    async fn unseal(&self, _share: &str) -> Result<SealStatusResponse, VaultError> {
        self.record("unseal");
        Ok(self
            .unseal_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn health_active(&self) -> Result<bool, VaultError> {
        self.record("health_active");
        Ok(true)
    }

    async fn leader(&self) -> Result<LeaderResponse, VaultError> {
        self.record("leader");
        Ok(LeaderResponse::default())
    }

    async fn raft_join(&self, _request: &RaftJoinRequest) -> Result<RaftJoinResponse, VaultError> {
        self.record("raft_join");
        Ok(self.raft_join_response.lock().unwrap().clone())
    }

    async fn generate_root_init(&self) -> Result<GenerateRootStatusResponse, VaultError> {
        self.record("generate_root_init");
        Ok(self.generate_root_init_response.lock().unwrap().clone())
    }

    async fn generate_root_update(
        &self,
        _key: &str,
        _nonce: &str,
    ) -> Result<GenerateRootStatusResponse, VaultError> {
        self.record("generate_root_update");
        Ok(self
            .generate_root_updates
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn generate_root_cancel(&self) -> Result<(), VaultError> {
        self.record("generate_root_cancel");
        Ok(())
    }

    async fn rekey_status(&self) -> Result<RekeyStatusResponse, VaultError> {
        self.record("rekey_status");
        Ok(self.rekey_status.lock().unwrap().clone())
    }

    async fn rekey_init(
        &self,
        _request: &RekeyInitRequest,
    ) -> Result<RekeyStatusResponse, VaultError> {
        self.record("rekey_init");
        Ok(self.rekey_init_response.lock().unwrap().clone())
    }

    async fn rekey_update(
        &self,
        _key: &str,
        _nonce: &str,
    ) -> Result<RekeyUpdateResponse, VaultError> {
        self.record("rekey_update");
        match self.rekey_updates.lock().unwrap().pop_front() {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(err)) => Err(api_error(err)),
            None => Ok(RekeyUpdateResponse::default()),
        }
    }

    async fn rekey_cancel(&self) -> Result<(), VaultError> {
        self.record("rekey_cancel");
        Ok(())
    }

    async fn logical_read(&self, path: &str) -> Result<Option<Secret>, VaultError> {
        self.record("logical_read");
        Ok(self.logical_reads.lock().unwrap().get(path).map(|data| Secret {
            data: Some(data.clone()),
            ..Default::default()
        }))
    }

    async fn logical_write(
        &self,
        path: &str,
        data: &serde_json::Value,
    ) -> Result<Option<Secret>, VaultError> {
        self.record("logical_write");
        self.writes
            .lock()
            .unwrap()
            .push((path.to_owned(), data.clone()));
        Ok(None)
    }

    async fn create_orphan_token(
        &self,
        request: &TokenCreateRequest,
    ) -> Result<Secret, VaultError> {
        self.record("create_orphan_token");
        self.orphan_requests.lock().unwrap().push(request.clone());
        Ok(Secret {
            auth: Some(SecretAuth {
                client_token: request.id.clone().unwrap_or_default(),
                policies: request.policies.clone(),
            }),
            ..Default::default()
        })
    }

    async fn revoke_self(&self) -> Result<(), VaultError> {
        self.record("revoke_self");
        Ok(())
    }

    fn set_token(&self, token: &str) {
        *self.token.lock().unwrap() = token.to_owned();
        self.token_history.lock().unwrap().push(token.to_owned());
    }

    fn token(&self) -> String {
        self.token.lock().unwrap().clone()
    }
}

/// Stub key source: `Some(keys)` to answer, `None` to fail the fetch.
pub(crate) struct StubPgpSource {
    pub keys: Option<Vec<String>>,
}

#[async_trait::async_trait]
impl PgpKeySource for StubPgpSource {
    async fn fetch(&self, _identifiers: &[String]) -> Result<Vec<String>, KeybaseError> {
        self.keys.clone().ok_or(KeybaseError::MissingKeys {
            names: vec!["stub".to_owned()],
        })
    }
}
