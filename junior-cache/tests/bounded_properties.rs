//! Property tests for the short-term LRU tier

use std::collections::VecDeque;

use junior_cache::cache::BoundedTier;
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone)]
enum Op {
    Set(u8),
    Get(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..16).prop_map(Op::Set),
        (0u8..16).prop_map(Op::Get),
    ]
}

proptest! {
    /// The tier never exceeds capacity and keeps exactly the most recently
    /// used keys
    #[test]
    fn lru_bound_and_survivors(
        capacity in 1usize..6,
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let tier = BoundedTier::new(capacity).unwrap();
        // Reference model: most recently used at the back
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                Op::Set(k) => {
                    tier.set(&k.to_string(), json!(k)).unwrap();
                    model.retain(|x| *x != k);
                    model.push_back(k);
                    if model.len() > capacity {
                        model.pop_front();
                    }
                }
                Op::Get(k) => {
                    let hit = tier.get(&k.to_string()).unwrap();
                    let in_model = model.contains(&k);
                    prop_assert_eq!(hit.is_some(), in_model);
                    if in_model {
                        model.retain(|x| *x != k);
                        model.push_back(k);
                    }
                }
            }

            prop_assert!(tier.len().unwrap() <= capacity);
        }

        let expected: Vec<String> = model.iter().map(|k| k.to_string()).collect();
        prop_assert_eq!(tier.keys_by_recency().unwrap(), expected);
    }
}
