#![no_main]

use libfuzzer_sys::fuzz_target;
use orbit_encrypt::{decrypt, encrypt};

fuzz_target!(|data: &[u8]| {
    // Sealing then opening arbitrary bytes must round-trip.
    let passphrase = "fuzz-passphrase";

    if let Ok(sealed) = encrypt(data, passphrase) {
        let opened = decrypt(&sealed, passphrase).expect("own sealed value must open");
        assert_eq!(data.to_vec(), opened);
        // The wrong passphrase must never open it.
        assert!(decrypt(&sealed, "other-passphrase").is_err());
    }
});
