use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Which connection cap refused a new socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitExceeded {
    Global,
    PerUser,
}

impl LimitExceeded {
    /// Websocket close code and reason for the refused socket.
    pub fn close_frame(self) -> (u16, &'static str) {
        match self {
            Self::Global => (1013, "Server is at connection capacity"),
            Self::PerUser => (1008, "Too many connections for this user"),
        }
    }
}

/// Global and per-user gateway connection caps.
pub struct ConnectionLimiter {
    active: AtomicUsize,
    per_user: DashMap<i64, usize>,
    max_global: usize,
    max_per_user: usize,
}

impl ConnectionLimiter {
    pub fn new(max_global: usize, max_per_user: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            per_user: DashMap::new(),
            max_global,
            max_per_user,
        }
    }

    /// Reserve a slot for `user_id`. The slot is released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>, user_id: i64) -> Result<ConnectionGuard, LimitExceeded> {
        if !self.try_acquire_global() {
            return Err(LimitExceeded::Global);
        }
        {
            let mut count = self.per_user.entry(user_id).or_insert(0);
            if *count >= self.max_per_user {
                drop(count);
                self.active.fetch_sub(1, Ordering::SeqCst);
                return Err(LimitExceeded::PerUser);
            }
            *count += 1;
        }
        Ok(ConnectionGuard {
            limiter: Arc::clone(self),
            user_id,
        })
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn active_for_user(&self, user_id: i64) -> usize {
        self.per_user.get(&user_id).map(|c| *c).unwrap_or(0)
    }

    fn try_acquire_global(&self) -> bool {
        let mut current = self.active.load(Ordering::SeqCst);
        loop {
            if current >= self.max_global {
                return false;
            }
            match self.active.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    fn release(&self, user_id: i64) {
        self.per_user.remove_if_mut(&user_id, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
    user_id: i64,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.release(self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_user_cap_is_enforced_and_released() {
        let limiter = Arc::new(ConnectionLimiter::new(10, 2));
        let a = limiter.try_acquire(1).unwrap();
        let _b = limiter.try_acquire(1).unwrap();
        assert_eq!(limiter.try_acquire(1).err(), Some(LimitExceeded::PerUser));
        assert_eq!(limiter.active(), 2);

        drop(a);
        assert_eq!(limiter.active_for_user(1), 1);
        assert!(limiter.try_acquire(1).is_ok());
    }

    #[test]
    fn global_cap_counts_every_user() {
        let limiter = Arc::new(ConnectionLimiter::new(2, 5));
        let _a = limiter.try_acquire(1).unwrap();
        let b = limiter.try_acquire(2).unwrap();
        assert_eq!(limiter.try_acquire(3).err(), Some(LimitExceeded::Global));

        drop(b);
        assert_eq!(limiter.active_for_user(2), 0);
        assert!(limiter.try_acquire(3).is_ok());
    }
}
