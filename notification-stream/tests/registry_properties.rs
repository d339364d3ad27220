//! Property tests of the stream registry against a simple model.

use async_trait::async_trait;
use notification_stream::{SessionError, StreamCategory, StreamKey, StreamRegistry, StreamSession};
use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

struct NullSession;

#[async_trait]
impl StreamSession for NullSession {
    fn url(&self) -> &str {
        "http://controller.example/stream"
    }

    async fn close(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Op {
    /// Remove whatever is registered for the key, then add a fresh entry
    Replace(usize),
    Remove(usize),
    Increment(usize),
}

fn keys() -> Vec<StreamKey> {
    let mut keys = Vec::new();
    for controller in ["ctrl1", "ctrl2"] {
        for category in StreamCategory::ALL {
            keys.push(StreamKey::new(controller, "v1", category));
        }
    }
    keys
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..6).prop_map(Op::Replace),
        (0usize..6).prop_map(Op::Remove),
        (0usize..6).prop_map(Op::Increment),
    ]
}

proptest! {
    #[test]
    fn registry_matches_model(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let keys = keys();
        let registry = StreamRegistry::new(Duration::from_secs(1));
        let mut model: HashMap<StreamKey, u64> = HashMap::new();

        runtime.block_on(async {
            for op in &ops {
                match op {
                    Op::Replace(i) => {
                        registry.remove(&keys[*i]).await;
                        registry.add(keys[*i].clone(), Box::new(NullSession));
                        model.insert(keys[*i].clone(), 0);
                    }
                    Op::Remove(i) => {
                        registry.remove(&keys[*i]).await;
                        model.remove(&keys[*i]);
                    }
                    Op::Increment(i) => {
                        let expected = match model.get_mut(&keys[*i]) {
                            Some(counter) => {
                                *counter += 1;
                                *counter as i64
                            }
                            None => -1,
                        };
                        assert_eq!(registry.increment_counter(&keys[*i]), expected);
                    }
                }
            }
        });

        prop_assert_eq!(registry.len(), model.len());
        for key in &keys {
            let snapshot = registry.lookup(key);
            prop_assert_eq!(snapshot.as_ref().map(|s| s.counter), model.get(key).copied());
            prop_assert_eq!(registry.exists(key), model.contains_key(key));
        }
    }

    #[test]
    fn session_ids_follow_insertion_order(count in 1usize..20) {
        let registry = StreamRegistry::default();
        let keys = keys();

        let ids: Vec<_> = (0..count)
            .map(|i| registry.add(keys[i % keys.len()].clone(), Box::new(NullSession)))
            .collect();

        let listed: Vec<_> = registry.list_all().iter().map(|s| s.session_id).collect();
        prop_assert_eq!(listed, ids);
    }
}
