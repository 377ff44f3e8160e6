#![no_main]

use std::io::Write;

use dsutil::{ReaderOptions, TypedReader, ValueType, BLOCK_SIZE};
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes framed as uncompressed blocks, decoded with a fuzzer-chosen domain. Decoding
// must fail with an error, never panic or allocate without bound.
fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let ty = ValueType::ALL[usize::from(selector) % ValueType::ALL.len()];

    let Ok(mut file) = tempfile::NamedTempFile::new() else {
        return;
    };
    for chunk in payload.chunks(BLOCK_SIZE) {
        let len = (chunk.len() as u32).to_le_bytes();
        if file.write_all(&len).and_then(|_| file.write_all(&len)).and_then(|_| file.write_all(chunk)).is_err() {
            return;
        }
    }

    let options = ReaderOptions {
        compression: "none".to_owned(),
        ..ReaderOptions::default()
    };
    let Ok(reader) = TypedReader::open(file.path(), ty, options) else {
        return;
    };
    for value in reader {
        let Ok(value) = value else {
            break;
        };
        // Whatever decodes must hash without error in its own domain.
        ty.base().hash(&value).expect("decoded value hashes in its domain");
    }
});
