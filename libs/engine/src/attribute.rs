//! Typed payload attribute accessors, see [`crate::PayloadAttribute`].
use abci_roles::{Payload, Value};

/// Accepts any value.
pub fn any(payload: &Payload) -> Option<&Value> {
    Some(&payload.value)
}

/// Accepts `Text`.
pub fn text(payload: &Payload) -> Option<&Value> {
    payload.value.as_text().map(|_| &payload.value)
}

/// Accepts `Text` or `Null`.
pub fn text_or_null(payload: &Payload) -> Option<&Value> {
    (payload.value.is_null() || payload.value.as_text().is_some()).then_some(&payload.value)
}

/// Accepts `Bool` or `Null`.
pub fn bool_or_null(payload: &Payload) -> Option<&Value> {
    (payload.value.is_null() || payload.value.as_bool().is_some()).then_some(&payload.value)
}

/// Accepts a non-negative `Int`.
pub fn non_negative_int(payload: &Payload) -> Option<&Value> {
    payload
        .value
        .as_int()
        .filter(|i| *i >= 0)
        .map(|_| &payload.value)
}

/// Accepts a finite `Float`. `Int` is rejected, so that `Int(3)` and `Float(3.0)`
/// can't split the votes of a same-value round.
pub fn float(payload: &Payload) -> Option<&Value> {
    match &payload.value {
        Value::Float(f) if f.0.is_finite() => Some(&payload.value),
        _ => None,
    }
}

/// Accepts a `List` of finite numbers.
pub fn number_list(payload: &Payload) -> Option<&Value> {
    let list = payload.value.as_list()?;
    list.iter()
        .all(|v| v.as_f64().is_some_and(f64::is_finite))
        .then_some(&payload.value)
}
