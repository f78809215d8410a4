//! Iteration bodies: what one acquired slot does against the target.

use rand::Rng;

use volley_core::{PayloadGenerator, RunMetrics, SlotHandle, WorkloadMode};

use crate::client::ApiClient;

/// Transaction identifiers probed by the mixed workload. Low ids are
/// probed repeatedly so the target's read cache gets both hits and
/// misses (a 404 on a not-yet-written transaction is not a fault).
const PROBED_TRANSACTION_IDS: u64 = 50;

/// Runs one iteration and records every exchange outcome.
pub async fn run_iteration(
    mode: WorkloadMode,
    client: &ApiClient,
    generator: &PayloadGenerator,
    metrics: &RunMetrics,
    slot: SlotHandle,
) {
    match mode {
        WorkloadMode::TransferOnly => {
            let transfer = generator.next_transfer(&slot);
            let result = client.create_transfer(&transfer).await;
            metrics.record(&result.outcome);
        }
        WorkloadMode::FullFlow => full_flow(client, generator, metrics, slot).await,
        WorkloadMode::Mixed {
            transfer_weight,
            account_read_weight,
            transaction_read_weight,
        } => {
            mixed(
                client,
                generator,
                metrics,
                slot,
                [transfer_weight, account_read_weight, transaction_read_weight],
            )
            .await;
        }
    }
}

/// Create sender and receiver, read the sender back, then transfer
/// between the fresh accounts. Aborts the iteration (not the run) as
/// soon as a step is not accepted.
async fn full_flow(
    client: &ApiClient,
    generator: &PayloadGenerator,
    metrics: &RunMetrics,
    slot: SlotHandle,
) {
    let (sender, receiver) = generator.next_participants(&slot);

    let created_sender = client.create_participant(&sender).await;
    metrics.record(&created_sender.outcome);
    if created_sender.outcome.status.is_failure() {
        return;
    }
    let Some(sender_id) = created_sender.entity_id() else {
        return;
    };

    let created_receiver = client.create_participant(&receiver).await;
    metrics.record(&created_receiver.outcome);
    if created_receiver.outcome.status.is_failure() {
        return;
    }
    let Some(receiver_id) = created_receiver.entity_id() else {
        return;
    };

    // Verifies persistence before transferring.
    let read_back = client.read_participant(sender_id).await;
    metrics.record(&read_back.outcome);

    let transfer = generator.transfer_between(sender_id, receiver_id);
    let result = client.create_transfer(&transfer).await;
    metrics.record(&result.outcome);
}

/// Weighted choice between a transfer and cache-exercising reads.
async fn mixed(
    client: &ApiClient,
    generator: &PayloadGenerator,
    metrics: &RunMetrics,
    slot: SlotHandle,
    weights: [u32; 3],
) {
    let total: u32 = weights.iter().sum();
    let roll = rand::thread_rng().gen_range(0..total);
    let transfer = generator.next_transfer(&slot);

    let result = if roll < weights[0] {
        client.create_transfer(&transfer).await
    } else if roll < weights[0] + weights[1] {
        client.read_account(transfer.sender_account_id).await
    } else {
        let id = rand::thread_rng().gen_range(1..=PROBED_TRANSACTION_IDS);
        client.read_transaction(id).await
    };
    metrics.record(&result.outcome);
}
