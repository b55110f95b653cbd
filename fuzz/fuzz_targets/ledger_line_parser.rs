#![no_main]

use libfuzzer_sys::fuzz_target;
use runledger::fingerprint::Fingerprint;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Any line that parses must print back to the same fingerprint
        if let Some(fp) = Fingerprint::parse(input) {
            assert_eq!(Fingerprint::parse(&fp.to_line()), Some(fp));
        }
    }
});
