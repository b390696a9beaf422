//! Login challenges: issue, single-use redemption and expiry sweeping.

use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

/// Delivery channel for a freshly issued challenge.
pub trait ChallengeNotifier: Send + Sync {
    fn deliver(&self, account: &str, challenge: &str);
}

/// Writes challenges to the log instead of sending mail.
pub struct LogNotifier;

impl ChallengeNotifier for LogNotifier {
    fn deliver(&self, account: &str, challenge: &str) {
        tracing::info!("Login challenge issued for {}", account);
        tracing::debug!("Challenge for {}: {}", account, challenge);
    }
}

struct PendingChallenge {
    code: String,
    expires_at: Instant,
}

/// Outstanding challenges keyed by account.
pub struct ChallengeCache {
    entries: Mutex<HashMap<String, PendingChallenge>>,
    ttl: Duration,
}

impl ChallengeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a new challenge for `account`, replacing any outstanding one.
    pub fn issue(&self, account: &str) -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let code = hex::encode(bytes);

        let mut entries = self.lock();
        entries.insert(
            account.to_string(),
            PendingChallenge {
                code: code.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        code
    }

    /// Consume the challenge if `response` matches and has not expired.
    pub fn redeem(&self, account: &str, response: &str) -> bool {
        let mut entries = self.lock();
        let Some(pending) = entries.get(account) else {
            return false;
        };

        if pending.expires_at <= Instant::now() {
            entries.remove(account);
            return false;
        }
        if !bool::from(pending.code.as_bytes().ct_eq(response.as_bytes())) {
            return false;
        }

        entries.remove(account);
        true
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, pending| pending.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingChallenge>> {
        // Entries stay valid even if a previous holder panicked.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to the background sweeper task.
pub struct SweeperHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Challenge sweeper ended abnormally: {}", e);
        }
    }
}

/// Periodically remove expired challenges until stopped.
pub fn spawn_sweeper(cache: Arc<ChallengeCache>, every: Duration) -> SweeperHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        tracing::debug!("Swept {} expired challenges", removed);
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Challenge sweeper stopped");
    });

    SweeperHandle { stop_tx, task }
}
