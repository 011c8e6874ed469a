//! Property test: for any sequence of subscribe/unsubscribe operations,
//! the resulting subscription list contains no duplicates and tracks
//! exactly the set of types subscribed-but-not-since-unsubscribed.

use proptest::prelude::*;
use sensorhub_core::kernel::subscriptions::SubscriptionList;
use std::collections::HashSet;

fn op_strategy() -> impl Strategy<Value = (bool, u32)> {
    (any::<bool>(), 0u32..8)
}

proptest! {
    #[test]
    fn subscription_list_stays_duplicate_free(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let mut subs = SubscriptionList::new();
        let mut model: HashSet<u32> = HashSet::new();

        for (subscribe, evt_type) in ops {
            if subscribe {
                subs.subscribe(evt_type);
                model.insert(evt_type);
            } else {
                subs.unsubscribe(evt_type);
                model.remove(&evt_type);
            }
        }

        let slice = subs.as_slice();
        let mut seen = HashSet::new();
        for &t in slice {
            prop_assert!(seen.insert(t), "duplicate event type {t} in subscription list");
        }

        let actual: HashSet<u32> = slice.iter().copied().collect();
        prop_assert_eq!(actual, model);
    }
}
