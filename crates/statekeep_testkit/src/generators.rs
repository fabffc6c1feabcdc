//! Property-based test generators using proptest.
//!
//! Ids are drawn from a small pool so random batches regularly collide
//! (duplicate inserts, updates of missing rows), which is where the
//! interesting commit outcomes live.

use crate::fixtures::User;
use proptest::prelude::*;
use statekeep_core::Operation;

/// Strategy for user ids from a pool of eight.
pub fn user_id_strategy() -> impl Strategy<Value = String> {
    (1u8..=8).prop_map(|n| n.to_string())
}

/// Strategy for users with arbitrary names, including quotes.
pub fn user_strategy() -> impl Strategy<Value = User> {
    (
        user_id_strategy(),
        prop::string::string_regex("[A-Za-z' ]{0,16}").expect("Invalid regex"),
        prop::string::string_regex("[a-z]{1,8}@[a-z]{1,8}\\.com").expect("Invalid regex"),
    )
        .prop_map(|(id, name, email)| User::new(id, name, email))
}

/// Strategy for operations.
pub fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Insert),
        Just(Operation::Update),
        Just(Operation::Delete),
    ]
}

/// Strategy for a batch of staged changes.
pub fn batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<(User, Operation)>> {
    prop::collection::vec((user_strategy(), operation_strategy()), 0..=max_len)
}

/// Strategy for a batch of inserts with distinct ids.
pub fn distinct_inserts_strategy(max_len: usize) -> impl Strategy<Value = Vec<User>> {
    prop::collection::vec(user_strategy(), 0..=max_len).prop_map(|users| {
        let mut seen = std::collections::HashSet::new();
        users
            .into_iter()
            .filter(|user| seen.insert(user.id.clone()))
            .collect()
    })
}

/// Strategy for operation names in random letter case.
pub fn operation_name_strategy() -> impl Strategy<Value = String> {
    (operation_strategy(), prop::collection::vec(any::<bool>(), 6)).prop_map(|(op, upper)| {
        op.as_str()
            .chars()
            .zip(upper)
            .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
            .collect()
    })
}
