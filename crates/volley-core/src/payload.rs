//! Workload payload synthesis.
//!
//! One [`WorkloadRequest`] is generated per iteration. Participant
//! selection is pluggable: uniform random pairs over a known universe,
//! deterministic sharding by slot ordinal (collision-free when the test
//! also creates records), or a fixed two-participant universe to
//! maximize contention on a shared balance.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::pool::SlotHandle;

/// How sender/receiver identifiers are selected each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SelectionPolicy {
    /// Uniform random pair drawn from `[1, max_participant]`, with the
    /// receiver resampled until it differs from the sender.
    UniformRandom {
        /// Upper bound of the seeded participant universe.
        max_participant: u64,
    },
    /// Each slot owns the disjoint range
    /// `[1 + ordinal * range_width, (ordinal + 1) * range_width]`, walked
    /// by the per-slot iteration counter. Required when the workload also
    /// creates participant records under high concurrency.
    ShardedBySlot {
        /// Identifiers owned by each slot. Must be at least 2.
        range_width: u64,
    },
    /// Fixed two-participant universe; every transfer bounces between
    /// the same pair to maximize contention on one balance.
    FixedPair {
        /// First participant identifier.
        first: u64,
        /// Second participant identifier.
        second: u64,
    },
}

impl SelectionPolicy {
    /// Validates policy parameters.
    pub fn validate(&self) -> CoreResult<()> {
        match *self {
            Self::UniformRandom { max_participant } => {
                if max_participant < 2 {
                    return Err(CoreError::invalid_config(
                        "uniform_random requires max_participant >= 2",
                    ));
                }
            }
            Self::ShardedBySlot { range_width } => {
                if range_width < 2 {
                    return Err(CoreError::invalid_config(
                        "sharded_by_slot requires range_width >= 2",
                    ));
                }
            }
            Self::FixedPair { first, second } => {
                if first == second {
                    return Err(CoreError::invalid_config(
                        "fixed_pair participants must differ",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Amount bounds and optional fault-injection mix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountPolicy {
    /// Smallest amount drawn (whole currency units).
    pub min: u64,
    /// Largest amount drawn (whole currency units).
    pub max: u64,
    /// Probability of substituting a negative amount the target must
    /// reject as invalid.
    #[serde(default)]
    pub invalid_ratio: f64,
    /// Probability of substituting an amount far above any starting
    /// balance, provoking an insufficient-funds rejection.
    #[serde(default)]
    pub overdraw_ratio: f64,
}

impl Default for AmountPolicy {
    fn default() -> Self {
        Self {
            min: 1,
            max: 100,
            invalid_ratio: 0.0,
            overdraw_ratio: 0.0,
        }
    }
}

impl AmountPolicy {
    /// Validates bounds and ratios.
    pub fn validate(&self) -> CoreResult<()> {
        if self.min == 0 || self.min > self.max {
            return Err(CoreError::invalid_config(format!(
                "amount bounds must satisfy 0 < min <= max, got {}..{}",
                self.min, self.max
            )));
        }
        let mix = self.invalid_ratio + self.overdraw_ratio;
        if !(0.0..=1.0).contains(&self.invalid_ratio)
            || !(0.0..=1.0).contains(&self.overdraw_ratio)
            || mix > 1.0
        {
            return Err(CoreError::invalid_config(
                "fault-injection ratios must be in [0, 1] and sum to at most 1",
            ));
        }
        Ok(())
    }
}

/// One transfer request body, consumed once by the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRequest {
    pub sender_account_id: u64,
    pub receiver_account_id: u64,
    pub amount: f64,
    pub idempotency_key: Uuid,
}

/// One participant-creation request body for workloads that register
/// fresh users before transferring between them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub name: String,
    pub document: String,
    pub email: String,
    pub password: String,
    pub balance: f64,
    #[serde(rename = "type")]
    pub participant_type: String,
}

/// Stateless per-iteration payload generator.
///
/// All randomness comes from the calling thread's RNG; uniqueness of
/// sharded identifiers and documents is a function of the slot handle
/// alone, so concurrent slots can never collide.
#[derive(Debug, Clone)]
pub struct PayloadGenerator {
    policy: SelectionPolicy,
    amounts: AmountPolicy,
}

impl PayloadGenerator {
    /// Creates a generator after validating both policies.
    pub fn new(policy: SelectionPolicy, amounts: AmountPolicy) -> CoreResult<Self> {
        policy.validate()?;
        amounts.validate()?;
        Ok(Self { policy, amounts })
    }

    /// Synthesizes the transfer request for the given slot's current
    /// iteration. The idempotency key is fresh for every logical attempt.
    #[must_use]
    pub fn next_transfer(&self, slot: &SlotHandle) -> WorkloadRequest {
        let (sender, receiver) = self.participant_pair(slot);
        WorkloadRequest {
            sender_account_id: sender,
            receiver_account_id: receiver,
            amount: self.next_amount(),
            idempotency_key: Uuid::new_v4(),
        }
    }

    /// Builds a transfer between two already-known participants, e.g.
    /// ones the full-flow workload just created. The amount policy and
    /// fresh idempotency key apply as usual.
    #[must_use]
    pub fn transfer_between(&self, sender: u64, receiver: u64) -> WorkloadRequest {
        WorkloadRequest {
            sender_account_id: sender,
            receiver_account_id: receiver,
            amount: self.next_amount(),
            idempotency_key: Uuid::new_v4(),
        }
    }

    /// Synthesizes a unique sender/receiver participant pair for the
    /// full-flow workload. Documents and emails are derived from the
    /// slot ordinal and iteration counter, so no two logical attempts
    /// can trip the target's unique constraints.
    #[must_use]
    pub fn next_participants(&self, slot: &SlotHandle) -> (ParticipantRecord, ParticipantRecord) {
        let attempt = unique_attempt_id(slot);
        let sender = participant(attempt * 2, "Sender", 1000.0);
        let receiver = participant(attempt * 2 + 1, "Receiver", 0.0);
        (sender, receiver)
    }

    fn participant_pair(&self, slot: &SlotHandle) -> (u64, u64) {
        let mut rng = rand::thread_rng();
        match self.policy {
            SelectionPolicy::UniformRandom { max_participant } => {
                let sender = rng.gen_range(1..=max_participant);
                let mut receiver = rng.gen_range(1..=max_participant);
                while receiver == sender {
                    receiver = rng.gen_range(1..=max_participant);
                }
                (sender, receiver)
            }
            SelectionPolicy::ShardedBySlot { range_width } => {
                let base = 1 + slot.ordinal as u64 * range_width;
                let step = slot.iteration.wrapping_mul(2);
                let sender = base + step % range_width;
                let receiver = base + (step + 1) % range_width;
                (sender, receiver)
            }
            SelectionPolicy::FixedPair { first, second } => {
                if rng.gen_bool(0.5) {
                    (first, second)
                } else {
                    (second, first)
                }
            }
        }
    }

    fn next_amount(&self) -> f64 {
        let mut rng = rand::thread_rng();
        let roll: f64 = rng.gen();
        if roll < self.amounts.invalid_ratio {
            return -50.0;
        }
        if roll < self.amounts.invalid_ratio + self.amounts.overdraw_ratio {
            return 50_000.0;
        }
        rng.gen_range(self.amounts.min..=self.amounts.max) as f64
    }
}

/// Globally-unique attempt number for a slot's current iteration.
fn unique_attempt_id(slot: &SlotHandle) -> u64 {
    // Up to 10M iterations per slot before ranges would overlap.
    slot.ordinal as u64 * 10_000_000 + slot.iteration % 10_000_000
}

fn participant(id: u64, role: &str, balance: f64) -> ParticipantRecord {
    ParticipantRecord {
        name: format!("{role} {id}"),
        document: format!("{id:011}"),
        email: format!("{}.{id}@volley.test", role.to_lowercase()),
        password: "password123".to_string(),
        balance,
        participant_type: "COMMON".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn slot(ordinal: usize, iteration: u64) -> SlotHandle {
        SlotHandle { ordinal, iteration }
    }

    fn generator(policy: SelectionPolicy) -> PayloadGenerator {
        PayloadGenerator::new(policy, AmountPolicy::default()).unwrap()
    }

    #[test]
    fn uniform_sender_never_equals_receiver() {
        let gen = generator(SelectionPolicy::UniformRandom { max_participant: 3 });
        for i in 0..10_000 {
            let req = gen.next_transfer(&slot(0, i));
            assert_ne!(req.sender_account_id, req.receiver_account_id);
            assert!((1..=3).contains(&req.sender_account_id));
            assert!((1..=3).contains(&req.receiver_account_id));
        }
    }

    #[test]
    fn idempotency_keys_are_pairwise_distinct() {
        let gen = generator(SelectionPolicy::UniformRandom {
            max_participant: 100,
        });
        let mut seen = HashSet::new();
        for i in 0..10_000 {
            let req = gen.next_transfer(&slot((i % 7) as usize, i));
            assert!(seen.insert(req.idempotency_key));
        }
    }

    #[test]
    fn sharded_slots_own_disjoint_ranges() {
        let gen = generator(SelectionPolicy::ShardedBySlot { range_width: 10 });
        let mut per_slot: Vec<HashSet<u64>> = vec![HashSet::new(); 4];
        for ordinal in 0..4 {
            for iteration in 0..50 {
                let req = gen.next_transfer(&slot(ordinal, iteration));
                assert_ne!(req.sender_account_id, req.receiver_account_id);
                per_slot[ordinal].insert(req.sender_account_id);
                per_slot[ordinal].insert(req.receiver_account_id);
            }
        }
        for a in 0..4 {
            for b in (a + 1)..4 {
                assert!(per_slot[a].is_disjoint(&per_slot[b]));
            }
        }
    }

    #[test]
    fn fixed_pair_bounces_between_two_participants() {
        let gen = generator(SelectionPolicy::FixedPair { first: 1, second: 2 });
        for i in 0..100 {
            let req = gen.next_transfer(&slot(0, i));
            assert_ne!(req.sender_account_id, req.receiver_account_id);
            assert!(req.sender_account_id == 1 || req.sender_account_id == 2);
            assert!(req.receiver_account_id == 1 || req.receiver_account_id == 2);
        }
    }

    #[test]
    fn amounts_stay_within_bounds() {
        let gen = PayloadGenerator::new(
            SelectionPolicy::UniformRandom {
                max_participant: 10,
            },
            AmountPolicy {
                min: 1,
                max: 50,
                invalid_ratio: 0.0,
                overdraw_ratio: 0.0,
            },
        )
        .unwrap();
        for i in 0..1000 {
            let amount = gen.next_transfer(&slot(0, i)).amount;
            assert!(amount >= 1.0 && amount <= 50.0);
        }
    }

    #[test]
    fn fault_injection_produces_rejectable_amounts() {
        let gen = PayloadGenerator::new(
            SelectionPolicy::FixedPair { first: 1, second: 2 },
            AmountPolicy {
                min: 10,
                max: 100,
                invalid_ratio: 0.5,
                overdraw_ratio: 0.5,
            },
        )
        .unwrap();
        let mut saw_invalid = false;
        let mut saw_overdraw = false;
        for i in 0..500 {
            let amount = gen.next_transfer(&slot(0, i)).amount;
            if amount < 0.0 {
                saw_invalid = true;
            }
            if amount >= 50_000.0 {
                saw_overdraw = true;
            }
        }
        assert!(saw_invalid);
        assert!(saw_overdraw);
    }

    #[test]
    fn participant_records_are_unique_per_attempt() {
        let gen = generator(SelectionPolicy::ShardedBySlot { range_width: 10 });
        let mut documents = HashSet::new();
        let mut emails = HashSet::new();
        for ordinal in 0..3 {
            for iteration in 0..100 {
                let (sender, receiver) = gen.next_participants(&slot(ordinal, iteration));
                assert!(documents.insert(sender.document.clone()));
                assert!(documents.insert(receiver.document.clone()));
                assert!(emails.insert(sender.email.clone()));
                assert!(emails.insert(receiver.email.clone()));
                assert_eq!(sender.document.len(), 11);
            }
        }
    }

    #[test]
    fn rejects_degenerate_policies() {
        assert!(SelectionPolicy::UniformRandom { max_participant: 1 }
            .validate()
            .is_err());
        assert!(SelectionPolicy::ShardedBySlot { range_width: 1 }
            .validate()
            .is_err());
        assert!(SelectionPolicy::FixedPair { first: 7, second: 7 }
            .validate()
            .is_err());
        assert!(AmountPolicy {
            min: 0,
            max: 10,
            invalid_ratio: 0.0,
            overdraw_ratio: 0.0,
        }
        .validate()
        .is_err());
        assert!(AmountPolicy {
            min: 1,
            max: 10,
            invalid_ratio: 0.8,
            overdraw_ratio: 0.8,
        }
        .validate()
        .is_err());
    }
}
