use framekv_proto::{
    DeleteCommand, GetCommand, Message, MetricsCommand, MetricsReport, Response, ResponsePayload,
    SetCommand,
};

use crate::metrics::{self, MetricsRegistry};
use crate::store::KvStore;

/// Maps one decoded message to exactly one response, applying its store and
/// counter side effects. Counter updates happen after the store lock is
/// released.
pub fn execute(store: &KvStore, registry: &MetricsRegistry, msg: Message) -> Response {
    match msg {
        Message::Get(cmd) => execute_get(store, registry, cmd),
        Message::Set(cmd) => execute_set(store, registry, cmd),
        Message::Delete(cmd) => execute_delete(store, registry, cmd),
        Message::Metrics(cmd) => execute_metrics(store, registry, cmd),
        Message::Response(_) => Response::error("cannot execute a response message"),
    }
}

fn execute_get(store: &KvStore, registry: &MetricsRegistry, cmd: GetCommand) -> Response {
    let found = store.get_many(&cmd.keys);
    // Misses count too: this tracks keys requested, not keys served.
    registry.increment(metrics::KEYS_READ_COUNT, cmd.keys.len() as i64);
    Response::ok(Some(ResponsePayload::KvList(found)))
}

fn execute_set(store: &KvStore, registry: &MetricsRegistry, cmd: SetCommand) -> Response {
    let keys: Vec<String> = cmd.pairs.iter().map(|(key, _)| key.clone()).collect();
    let batch_len = cmd.pairs.len() as i64;
    let (old_total, new_total) = store.insert_many(cmd.pairs);
    registry.increment(metrics::KEYS_UPDATED_COUNT, batch_len);
    registry.increment(
        metrics::TOTAL_STORE_CONTENTS_SIZE,
        new_total as i64 - old_total as i64,
    );
    Response::ok(Some(ResponsePayload::KeyList(keys)))
}

fn execute_delete(store: &KvStore, registry: &MetricsRegistry, cmd: DeleteCommand) -> Response {
    let (removed, bytes_removed) = store.remove_many(&cmd.keys);
    registry.decrement(metrics::KEYS_DELETED_COUNT, removed.len() as i64);
    registry.decrement(metrics::TOTAL_STORE_CONTENTS_SIZE, bytes_removed as i64);
    if removed.is_empty() {
        Response::ok(None)
    } else {
        Response::ok(Some(ResponsePayload::KeyList(removed)))
    }
}

fn execute_metrics(store: &KvStore, registry: &MetricsRegistry, cmd: MetricsCommand) -> Response {
    let report = store.with_read(|map| MetricsReport {
        key_count: if cmd.key_count {
            Some(map.len() as i64)
        } else {
            None
        },
        total_store_contents_size: if cmd.total_store_contents_size {
            registry.get(metrics::TOTAL_STORE_CONTENTS_SIZE)
        } else {
            None
        },
        keys_read_count: if cmd.keys_read_count {
            registry.get(metrics::KEYS_READ_COUNT)
        } else {
            None
        },
        keys_updated_count: if cmd.keys_updated_count {
            registry.get(metrics::KEYS_UPDATED_COUNT)
        } else {
            None
        },
        keys_deleted_count: if cmd.keys_deleted_count {
            registry.get(metrics::KEYS_DELETED_COUNT)
        } else {
            None
        },
    });
    Response::ok(Some(ResponsePayload::Metrics(report)))
}
