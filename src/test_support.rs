use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

/// Serializes tests that touch `LLMDECK_*` environment variables.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Holds [`ENV_LOCK`] and removes every variable it set when dropped.
pub struct ScopedEnv {
    keys: Vec<&'static str>,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    /// Sync tests only; async tests should take `ENV_LOCK.lock().await`.
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            _lock: ENV_LOCK.blocking_lock(),
        }
    }

    pub fn set(&mut self, key: &'static str, value: impl AsRef<std::ffi::OsStr>) -> &mut Self {
        std::env::set_var(key, value);
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
        self
    }

    pub fn remove(&mut self, key: &'static str) -> &mut Self {
        std::env::remove_var(key);
        self
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for key in &self.keys {
            std::env::remove_var(key);
        }
    }
}
