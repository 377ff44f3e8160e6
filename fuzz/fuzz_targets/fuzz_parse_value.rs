#![no_main]

use dsutil::{Value, ValueType};
use libfuzzer_sys::fuzz_target;

const PARSED: [ValueType; 7] = [
    ValueType::ParsedFloat64,
    ValueType::ParsedFloat32,
    ValueType::ParsedNumber,
    ValueType::ParsedInt64,
    ValueType::ParsedInt32,
    ValueType::ParsedBits64,
    ValueType::ParsedBits32,
];

/// Keep the harness bounded: long digit strings make BigInt parsing quadratic.
const MAX_INPUT_BYTES: usize = 4096;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, text)) = data.split_first() else {
        return;
    };
    let text = &text[..text.len().min(MAX_INPUT_BYTES)];
    let ty = PARSED[usize::from(selector) % PARSED.len()];
    let input = Value::from(String::from_utf8_lossy(text).into_owned());

    if let Ok(stored) = ty.validate(&input, true) {
        // A parsed value stores as its base domain and hashes the same either way.
        let base = ty.base().validate(&stored, true).expect("stored value revalidates");
        assert_eq!(base, stored);
        assert_eq!(
            ty.hash(&input).expect("hash of accepted input"),
            ty.base().hash(&stored).expect("hash of stored value")
        );
    }
});
