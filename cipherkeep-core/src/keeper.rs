//! Client facade sequencing password check, sync and mutations.
//!
//! [`Keeper::initialize`] enrols an account on this device; [`Keeper::unlock`]
//! verifies the master password against the canary and yields a [`Session`]
//! through which every other command runs.

use crate::config::ClientConfig;
use crate::crypto::{
    create_canary, derive_key, open, seal, verify_key, verify_password, MasterKey,
    CANARY_METADATA,
};
use crate::mirror::LocalMirror;
use crate::profile::{validate_account, Profile};
use crate::sync::models::UpdateRequest;
use crate::sync::{Cancellation, KeeperClient, SyncEngine, SyncReport};
use crate::{CryptoError, KeeperError, Result};
use tracing::{info, warn};

/// Listing row for an active secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    pub id: i64,
    pub metadata: String,
    pub history_id: i64,
}

/// What `initialize` found on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// A new account was registered and its canary written.
    Created,
    /// The account already existed; the mirror was synced and the password verified.
    Joined(SyncReport),
}

pub struct Keeper {
    config: ClientConfig,
    profile: Profile,
    cancel: Cancellation,
}

impl Keeper {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let profile = Profile::new(config.data_dir.clone())?;
        Ok(Self {
            config,
            profile,
            cancel: Cancellation::new(),
        })
    }

    /// Use `cancel` for every network call made through this keeper.
    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    fn client(&self) -> Result<KeeperClient> {
        KeeperClient::new(&self.config.server_url, self.config.timeout())
    }

    /// Enrol `account` on this device.
    ///
    /// Registers the account (an existing one is joined instead), completes the
    /// challenge login with the code returned by `code_prompt`, then either
    /// verifies the password against the synced canary or writes a fresh one.
    /// The token is stored and the account made current only on success.
    pub async fn initialize<F>(
        &self,
        account: &str,
        password: &str,
        code_prompt: F,
    ) -> Result<InitOutcome>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        let account = account.trim();
        validate_account(account)?;
        let mut client = self.client()?;

        let existing = match self.cancel.guard(client.register(account)).await {
            Ok(()) => false,
            Err(KeeperError::Conflict(_)) => true,
            Err(e) => return Err(e),
        };
        info!(
            "Initializing {} account {}",
            if existing { "existing" } else { "new" },
            account
        );

        let key = derive_key(password.as_bytes(), &self.config.kdf)?;
        let mut mirror = self.profile.open_mirror(account)?;

        let message = self.cancel.guard(client.request_challenge(account)).await?;
        let code = code_prompt(&message)?;
        let token = self
            .cancel
            .guard(client.redeem_challenge(account, code.trim()))
            .await?;

        let outcome = if existing {
            let report = self.sync_mirror(&client, &mut mirror).await?;
            match mirror.canary()? {
                Some(canary) => {
                    verify_key(&key, &canary.data)?;
                    InitOutcome::Joined(report)
                }
                None => {
                    warn!("Account {} has no password check record, creating one", account);
                    self.write_canary(&client, &mut mirror, &key).await?;
                    InitOutcome::Joined(report)
                }
            }
        } else {
            self.write_canary(&client, &mut mirror, &key).await?;
            InitOutcome::Created
        };

        self.profile.save_token(account, &key, &token)?;
        self.profile.set_current(account)?;
        Ok(outcome)
    }

    /// Verify the master password for the current account and open a session.
    pub fn unlock(&self, password: &str) -> Result<Session> {
        let account = self.profile.current()?;
        if !self.profile.has_mirror(&account)? {
            return Err(KeeperError::NotInitialized);
        }
        let mirror = self.profile.open_mirror(&account)?;
        let canary = mirror.canary()?.ok_or(KeeperError::NotInitialized)?;

        let key = verify_password(password.as_bytes(), &self.config.kdf, &canary.data)?;
        let token = match self.profile.load_token(&account, &key) {
            Ok(token) => token,
            Err(KeeperError::Crypto(CryptoError::AuthenticationFailed)) => {
                return Err(KeeperError::WrongPassword)
            }
            Err(e) => return Err(e),
        };

        let mut client = self.client()?;
        client.set_token(token);

        Ok(Session {
            account,
            key,
            mirror,
            client,
            profile: self.profile.clone(),
            page_size: self.config.page_size,
            cancel: self.cancel.clone(),
        })
    }

    async fn write_canary(
        &self,
        client: &KeeperClient,
        mirror: &mut LocalMirror,
        key: &MasterKey,
    ) -> Result<()> {
        let blob = create_canary(key)?;
        let request = UpdateRequest::add(blob, CANARY_METADATA.to_string());
        self.cancel.guard(client.mutate(&request)).await?;
        self.sync_mirror(client, mirror).await?;
        Ok(())
    }

    async fn sync_mirror(
        &self,
        client: &KeeperClient,
        mirror: &mut LocalMirror,
    ) -> Result<SyncReport> {
        SyncEngine::new(client, mirror, self.config.page_size)
            .sync_to_completion(&self.cancel)
            .await
    }
}

/// An unlocked account: verified key, open mirror and authenticated client.
pub struct Session {
    account: String,
    key: MasterKey,
    mirror: LocalMirror,
    client: KeeperClient,
    profile: Profile,
    page_size: u32,
    cancel: Cancellation,
}

impl Session {
    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn mirror(&self) -> &LocalMirror {
        &self.mirror
    }

    /// Pull everything past the local cursor.
    pub async fn sync(&mut self) -> Result<SyncReport> {
        SyncEngine::new(&self.client, &mut self.mirror, self.page_size)
            .sync_to_completion(&self.cancel)
            .await
    }

    /// Encrypt and upload a new secret. Returns its server id.
    pub async fn add(&mut self, plaintext: &[u8], metadata: &str) -> Result<i64> {
        self.sync().await?;
        let blob = seal(&self.key, plaintext)?;
        let request = UpdateRequest::add(blob, metadata.to_string());
        let resp = self.cancel.guard(self.client.mutate(&request)).await?;
        let id = resp.secure_data_id.ok_or_else(|| KeeperError::Server {
            status: 200,
            message: "ADD response carried no record id".to_string(),
        })?;
        self.sync().await?;
        Ok(id)
    }

    /// Replace a secret's payload. `metadata = None` keeps the current annotation.
    pub async fn update(&mut self, id: i64, plaintext: &[u8], metadata: Option<&str>) -> Result<()> {
        self.sync().await?;
        self.mirror.read_ciphertext(id)?;
        let metadata = match metadata {
            Some(m) => m.to_string(),
            None => self
                .mirror
                .get(id)?
                .map(|r| r.metadata)
                .unwrap_or_default(),
        };

        let blob = seal(&self.key, plaintext)?;
        let request = UpdateRequest::update(id, blob, metadata);
        self.cancel.guard(self.client.mutate(&request)).await?;
        self.sync().await?;
        Ok(())
    }

    /// Soft-delete a secret.
    pub async fn delete(&mut self, id: i64) -> Result<()> {
        self.sync().await?;
        self.mirror.read_ciphertext(id)?;

        let resp = self
            .cancel
            .guard(self.client.mutate(&UpdateRequest::delete(id)))
            .await?;
        self.sync().await?;
        // The sync above normally applies the DELETE; this covers a racing writer.
        if self.mirror.get(id)?.map(|r| r.is_active).unwrap_or(false) {
            self.mirror.mark_inactive(id, resp.history_id)?;
        }
        Ok(())
    }

    /// Active secrets (excluding the canary) after a sync.
    pub async fn list(&mut self) -> Result<Vec<SecretEntry>> {
        self.sync().await?;
        Ok(self
            .mirror
            .list_active()?
            .into_iter()
            .map(|r| SecretEntry {
                id: r.id,
                metadata: r.metadata,
                history_id: r.history_id,
            })
            .collect())
    }

    /// Sync, then decrypt a secret.
    pub async fn show(&mut self, id: i64) -> Result<Vec<u8>> {
        self.sync().await?;
        self.decrypt_local(id)
    }

    fn decrypt_local(&self, id: i64) -> Result<Vec<u8>> {
        let blob = self.mirror.read_ciphertext(id)?;
        Ok(open(&self.key, &blob)?)
    }

    /// Re-run the challenge login, e.g. after the server rejected an expired token.
    pub async fn relogin<F>(&mut self, code_prompt: F) -> Result<()>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        let message = self
            .cancel
            .guard(self.client.request_challenge(&self.account))
            .await?;
        let code = code_prompt(&message)?;
        let account = self.account.clone();
        let token = self
            .cancel
            .guard(self.client.redeem_challenge(&account, code.trim()))
            .await?;
        self.profile.save_token(&self.account, &self.key, &token)?;
        Ok(())
    }
}
