//! Canonical form of the observations.
use abci_roles::{Float, Value};

/// Extracts every numeric sample from `values` (descending into lists), drops
/// non-finite ones and returns the rest sorted ascending.
///
/// The result doesn't depend on the order of `values`, so replicas which collected
/// the same payloads in a different order compute the same transformation.
pub fn transform<'a>(values: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut samples = vec![];
    for value in values {
        collect_samples(value, &mut samples);
    }
    samples.sort();
    Value::List(samples.into_iter().map(Value::Float).collect())
}

fn collect_samples(value: &Value, samples: &mut Vec<Float>) {
    match value {
        Value::List(items) => {
            for item in items {
                collect_samples(item, samples);
            }
        }
        Value::Int(_) | Value::Float(_) => {
            if let Some(x) = value.as_f64().filter(|x| x.is_finite()) {
                samples.push(Float(x));
            }
        }
        _ => {}
    }
}
