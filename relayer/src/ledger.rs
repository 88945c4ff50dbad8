//! Per-transfer attempt bookkeeping: cool-down between attempts, a retry
//! ceiling, and eviction of entries nobody has touched for a while.

use crate::types::TransferKey;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    pub last_attempt: DateTime<Utc>,
    pub attempt_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    Proceed,
    Backoff,
    Refused,
}

#[derive(Debug, Clone)]
pub struct RetryLedger {
    cooldown: Duration,
    max_attempts: u32,
    retention: Duration,
    records: HashMap<TransferKey, AttemptRecord>,
}

impl RetryLedger {
    pub fn new(
        cooldown: std::time::Duration,
        max_attempts: u32,
        retention: std::time::Duration,
    ) -> Self {
        Self {
            cooldown: Duration::from_std(cooldown).unwrap_or(Duration::MAX),
            max_attempts,
            retention: Duration::from_std(retention).unwrap_or(Duration::MAX),
            records: HashMap::new(),
        }
    }

    pub fn decision(&self, key: &TransferKey, now: DateTime<Utc>) -> AttemptDecision {
        match self.records.get(key) {
            None => AttemptDecision::Proceed,
            Some(record) if record.attempt_count >= self.max_attempts => AttemptDecision::Refused,
            Some(record) if now - record.last_attempt <= self.cooldown => AttemptDecision::Backoff,
            Some(_) => AttemptDecision::Proceed,
        }
    }

    pub fn should_attempt(&self, key: &TransferKey, now: DateTime<Utc>) -> bool {
        self.decision(key, now) == AttemptDecision::Proceed
    }

    pub fn record_attempt(&mut self, key: TransferKey, now: DateTime<Utc>) {
        let record = self.records.entry(key).or_insert(AttemptRecord {
            last_attempt: now,
            attempt_count: 0,
        });
        record.attempt_count += 1;
        record.last_attempt = now;
    }

    /// Check and record in one step; only a `Proceed` decision is recorded.
    pub fn try_begin(&mut self, key: TransferKey, now: DateTime<Utc>) -> AttemptDecision {
        let decision = self.decision(&key, now);
        if decision == AttemptDecision::Proceed {
            self.record_attempt(key, now);
        }
        decision
    }

    pub fn get(&self, key: &TransferKey) -> Option<&AttemptRecord> {
        self.records.get(key)
    }

    /// Drop records whose last attempt is older than the retention window.
    /// Records at the retry ceiling stay as tombstones so the key stays refused.
    pub fn evict_stale(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        let retention = self.retention;
        let max_attempts = self.max_attempts;
        self.records.retain(|_, record| {
            record.attempt_count >= max_attempts || now - record.last_attempt < retention
        });
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Relay state that outlives a single pass of the dispatch loop.
#[derive(Debug, Clone)]
pub struct RelayState {
    pub ledger: RetryLedger,
    /// Keys whose signed message has been posted to the core bridge.
    pub posted: HashSet<TransferKey>,
    /// Keys whose payload failed validation; never attempted again and never
    /// evicted.
    pub rejected: HashSet<TransferKey>,
}

impl RelayState {
    pub fn new(ledger: RetryLedger) -> Self {
        Self {
            ledger,
            posted: HashSet::new(),
            rejected: HashSet::new(),
        }
    }

    /// Evict stale ledger entries along with their posted flags.
    pub fn evict_stale(&mut self, now: DateTime<Utc>) -> usize {
        let evicted = self.ledger.evict_stale(now);
        if evicted > 0 {
            let ledger = &self.ledger;
            self.posted.retain(|key| ledger.get(key).is_some());
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(sequence: u64) -> TransferKey {
        TransferKey {
            sequence,
            source_chain_id: 4,
        }
    }

    fn ledger() -> RetryLedger {
        RetryLedger::new(
            std::time::Duration::from_secs(180),
            5,
            std::time::Duration::from_secs(24 * 3600),
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_cooldown_enforcement() {
        let mut ledger = ledger();
        let k = key(1);

        assert!(ledger.should_attempt(&k, t0()));
        ledger.record_attempt(k, t0());

        assert!(!ledger.should_attempt(&k, t0() + Duration::seconds(60)));
        assert_eq!(ledger.decision(&k, t0() + Duration::seconds(179)), AttemptDecision::Backoff);
        assert_eq!(ledger.decision(&k, t0() + Duration::seconds(180)), AttemptDecision::Backoff);
        assert!(ledger.should_attempt(&k, t0() + Duration::seconds(181)));
    }

    #[test]
    fn test_ceiling_enforcement() {
        let mut ledger = ledger();
        let k = key(2);
        let mut now = t0();

        for _ in 0..5 {
            assert_eq!(ledger.try_begin(k, now), AttemptDecision::Proceed);
            now = now + Duration::seconds(200);
        }

        assert_eq!(ledger.get(&k).unwrap().attempt_count, 5);
        assert!(!ledger.should_attempt(&k, now));
        assert_eq!(ledger.decision(&k, now + Duration::days(3)), AttemptDecision::Refused);
    }

    #[test]
    fn test_backoff_is_not_recorded() {
        let mut ledger = ledger();
        let k = key(3);
        ledger.try_begin(k, t0());
        assert_eq!(ledger.try_begin(k, t0() + Duration::seconds(10)), AttemptDecision::Backoff);
        assert_eq!(ledger.get(&k).unwrap().attempt_count, 1);
        assert_eq!(ledger.get(&k).unwrap().last_attempt, t0());
    }

    #[test]
    fn test_keys_are_independent() {
        let mut ledger = ledger();
        ledger.record_attempt(key(1), t0());
        assert!(ledger.should_attempt(&key(2), t0()));
        assert!(ledger.should_attempt(
            &TransferKey {
                sequence: 1,
                source_chain_id: 5
            },
            t0()
        ));
    }

    #[test]
    fn test_evict_stale() {
        let mut state = RelayState::new(ledger());
        state.ledger.record_attempt(key(1), t0());
        state.ledger.record_attempt(key(2), t0() + Duration::hours(20));
        state.posted.insert(key(1));
        state.posted.insert(key(2));

        let evicted = state.evict_stale(t0() + Duration::hours(25));
        assert_eq!(evicted, 1);
        assert_eq!(state.ledger.len(), 1);
        assert!(!state.posted.contains(&key(1)));
        assert!(state.posted.contains(&key(2)));
    }

    #[test]
    fn test_refused_and_rejected_survive_eviction() {
        let mut state = RelayState::new(ledger());
        let mut now = t0();
        for _ in 0..5 {
            state.ledger.record_attempt(key(7), now);
            now = now + Duration::seconds(200);
        }
        state.rejected.insert(key(8));

        let later = now + Duration::days(3);
        assert_eq!(state.evict_stale(later), 0);
        assert_eq!(state.ledger.decision(&key(7), later), AttemptDecision::Refused);
        assert!(state.rejected.contains(&key(8)));
    }
}
