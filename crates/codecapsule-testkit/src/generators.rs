//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Value};

use codecapsule_core::{AccessMode, Requester};
use codecapsule_crypto::Payload;

use crate::fixtures::{grantee, owner, stranger, DAY};

/// Generate an AccessMode.
pub fn access_mode() -> impl Strategy<Value = AccessMode> {
    prop_oneof![
        Just(AccessMode::Private),
        Just(AccessMode::Shared),
        Just(AccessMode::Public),
    ]
}

/// One of the fixture identities, or anonymous.
pub fn requester() -> impl Strategy<Value = Requester> {
    prop_oneof![
        Just(owner()),
        Just(grantee()),
        Just(stranger()),
        Just(Requester::Anonymous),
    ]
}

/// A passphrase satisfying the client policy.
pub fn passphrase() -> impl Strategy<Value = String> {
    "[ -~]{8,32}".prop_map(String::from)
}

/// A syntactically valid e-mail address.
pub fn email() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.]{0,11}@[a-z]{1,10}\\.(com|org|dev)".prop_map(String::from)
}

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|f| json!(f)),
        ".{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Text or JSON payloads, including the empty string.
pub fn payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        ".{0,200}".prop_map(Payload::Text),
        json_value().prop_map(Payload::Json),
    ]
}

/// Something that can happen to a stored capsule over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultAction {
    /// Move the clock forward.
    Advance(i64),
    /// Move the clock backward, as a skewed server might.
    Rewind(i64),
    ListOwned,
    PublicFeed,
    Detail(Requester),
    Request(Requester),
}

pub fn vault_action() -> impl Strategy<Value = VaultAction> {
    prop_oneof![
        (0..3 * DAY).prop_map(VaultAction::Advance),
        (0..3 * DAY).prop_map(VaultAction::Rewind),
        Just(VaultAction::ListOwned),
        Just(VaultAction::PublicFeed),
        requester().prop_map(VaultAction::Detail),
        requester().prop_map(VaultAction::Request),
    ]
}
