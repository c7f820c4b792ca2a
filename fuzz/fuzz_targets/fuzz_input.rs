//! Fuzz testing for untrusted input: the `ip` query parameter and the
//! flat-file lookup table.
//!
//! Neither path may panic on any input. When a table loads, every IP it
//! reports must be retrievable.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the fuzz target
//! cargo +nightly fuzz run fuzz_input
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_input -- -max_total_time=60
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use geofind::lookup::CsvProvider;
use geofind::validation::validate_ip;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    ip: &'a str,
    table: &'a [u8],
}

fuzz_target!(|input: Input<'_>| {
    let valid = validate_ip(input.ip).is_ok();
    if valid {
        assert!(input.ip.parse::<std::net::IpAddr>().is_ok());
    }

    if let Ok(provider) = CsvProvider::from_reader(input.table) {
        let stats = provider.stats();
        assert_eq!(stats.total_rows, stats.valid_rows + stats.skipped_rows);
        assert_eq!(stats.unique_ips, provider.len());
        assert!(provider.len() <= stats.valid_rows);

        let _ = provider.lookup(input.ip);
    }
});
