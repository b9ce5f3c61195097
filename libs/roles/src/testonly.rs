//! Test-only utilities.
use rand::{
    distributions::{Alphanumeric, Distribution, Standard},
    Rng,
};

use crate::{Float, ParticipantId, Value};

/// Deterministic set of `n` participants, `agent_0..agent_{n-1}`.
pub fn participants(n: usize) -> Vec<ParticipantId> {
    (0..n).map(|i| ParticipantId(format!("agent_{i}"))).collect()
}

impl Distribution<ParticipantId> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParticipantId {
        let bytes: [u8; 20] = rng.gen();
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        ParticipantId(format!("0x{hex}"))
    }
}

impl Distribution<Value> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match rng.gen_range(0..5) {
            0 => Value::Null,
            1 => Value::Bool(rng.gen()),
            2 => Value::Int(rng.gen()),
            3 => Value::Float(Float(rng.gen())),
            _ => Value::Text(
                rng.sample_iter(&Alphanumeric)
                    .take(16)
                    .map(char::from)
                    .collect(),
            ),
        }
    }
}
