#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use keywarden::migration::{seal_legacy, LegacyMigrationAdapter};
use keywarden::secure_memory::SymmetricKey;
use keywarden::store::{MemoryStore, SecretStore};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct LegacyFuzzInput {
    plaintext: Vec<u8>,
    associated_data: Option<Vec<u8>>,
    raw: Vec<u8>,
}

fuzz_target!(|input: LegacyFuzzInput| {
    let store = Arc::new(MemoryStore::new()) as Arc<dyn SecretStore>;
    let adapter = LegacyMigrationAdapter::new(store);
    let key = SymmetricKey::new(&[0x42; 32]).unwrap();
    adapter.install_legacy_key(&key).unwrap();

    // Probing and decrypting fuzzed bytes must never panic
    let _ = adapter.is_legacy_format(&input.raw);
    let _ = adapter.decrypt(&input.raw, input.associated_data.as_deref());

    // A sealed legacy envelope must probe positive and round-trip
    if let Ok(sealed) = seal_legacy(&input.plaintext, &key, input.associated_data.as_deref()) {
        assert!(adapter.is_legacy_format(&sealed));
        let opened = adapter.decrypt(&sealed, input.associated_data.as_deref());
        assert_eq!(opened.unwrap(), input.plaintext);
    }
});
