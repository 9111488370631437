use crate::domain::ports::{LockProvider, LockToken, ScheduledTask, Scheduler};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Default hard upper bound on how long a key stays locked.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct HeldLock {
    generation: u64,
    created_at: Instant,
    ttl_timer: ScheduledTask,
}

#[derive(Debug, Default)]
struct RegistryState {
    held: HashMap<String, HeldLock>,
    next_generation: u64,
}

/// Process-local lock registry with a hard TTL per acquisition.
///
/// Every acquisition schedules its own expiry. Expiry is stamped with the
/// acquisition's generation so a stale timer can never release a later holder
/// of the same key. `Clone` shares the underlying registry.
#[derive(Clone)]
pub struct InMemoryLockRegistry {
    state: Arc<Mutex<RegistryState>>,
    ttl: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl InMemoryLockRegistry {
    pub fn new(ttl: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState::default())),
            ttl,
            scheduler,
        }
    }

    /// Acquires `key` without suspending. Returns `None` if it is held and
    /// its TTL has not run out yet.
    pub fn try_acquire_now(&self, key: &str) -> Option<LockToken> {
        let mut state = lock_state(&self.state);
        let now = Instant::now();

        if let Some(existing) = state.held.get(key) {
            if now.duration_since(existing.created_at) < self.ttl {
                return None;
            }
            // expired, timer has not fired yet
            existing.ttl_timer.cancel();
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let registry = Arc::clone(&self.state);
        let owned_key = key.to_owned();
        let ttl_timer = self.scheduler.schedule(
            self.ttl,
            Box::pin(async move { expire(&registry, &owned_key, generation) }),
        );

        state.held.insert(
            key.to_owned(),
            HeldLock {
                generation,
                created_at: now,
                ttl_timer,
            },
        );
        Some(LockToken(generation))
    }

    /// Releases the acquisition `token` was issued for. A token whose
    /// acquisition expired and was taken over leaves the new holder alone.
    pub fn release_now(&self, key: &str, token: LockToken) -> bool {
        let mut state = lock_state(&self.state);
        if !state
            .held
            .get(key)
            .is_some_and(|held| held.generation == token.0)
        {
            return false;
        }
        if let Some(released) = state.held.remove(key) {
            released.ttl_timer.cancel();
        }
        true
    }

    pub fn is_held(&self, key: &str) -> bool {
        lock_state(&self.state)
            .held
            .get(key)
            .is_some_and(|held| held.created_at.elapsed() < self.ttl)
    }

    pub fn held_count(&self) -> usize {
        lock_state(&self.state).held.len()
    }
}

fn lock_state(state: &Mutex<RegistryState>) -> MutexGuard<'_, RegistryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn expire(state: &Mutex<RegistryState>, key: &str, generation: u64) {
    let mut state = lock_state(state);
    if state
        .held
        .get(key)
        .is_some_and(|held| held.generation == generation)
    {
        state.held.remove(key);
        tracing::warn!(key, "lock was never released, expired by TTL");
    }
}

#[async_trait]
impl LockProvider for InMemoryLockRegistry {
    async fn try_acquire(&self, key: &str) -> Result<Option<LockToken>> {
        Ok(self.try_acquire_now(key))
    }

    async fn release(&self, key: &str, token: LockToken) -> Result<()> {
        if !self.release_now(key, token) {
            tracing::debug!(key, generation = token.0, "release of a lock no longer held");
        }
        Ok(())
    }
}
