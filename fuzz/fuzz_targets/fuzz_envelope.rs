#![no_main]

use arbitrary::Arbitrary;
use keywarden::migration::{envelope_key_version, open_versioned, seal_versioned};
use keywarden::secure_memory::SymmetricKey;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct EnvelopeFuzzInput {
    plaintext: Vec<u8>,
    key: Vec<u8>,
    version: u32,
    associated_data: Option<Vec<u8>>,
    raw: Vec<u8>,
}

fuzz_target!(|input: EnvelopeFuzzInput| {
    let key = if input.key.len() == 32 {
        SymmetricKey::new(&input.key).unwrap()
    } else {
        SymmetricKey::new(&[0x42; 32]).unwrap()
    };

    // Parsing fuzzed bytes must never panic
    let _ = envelope_key_version(&input.raw);
    let _ = open_versioned(&input.raw, &key, input.associated_data.as_deref());

    // A sealed envelope must round-trip and report its version
    if let Ok(sealed) = seal_versioned(
        &input.plaintext,
        &key,
        input.version,
        input.associated_data.as_deref(),
    ) {
        assert_eq!(envelope_key_version(&sealed), Some(input.version));
        let opened = open_versioned(&sealed, &key, input.associated_data.as_deref());
        assert_eq!(opened.unwrap(), input.plaintext);
    }
});
