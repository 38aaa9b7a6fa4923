// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Fuzz target for the query parser.
// Run with: cargo +nightly fuzz run fuzz_query_parser
//
// Arbitrary UTF-8 goes through validation, clause extraction and plan
// assembly. Any input must be rejected or accepted without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if input.len() <= 4096 {
            let _ = dbengine_query::validate(input);
            if let Ok(plan) = dbengine_query::parse(input) {
                if plan.has_filter() {
                    assert_eq!(
                        plan.restrictions.len(),
                        plan.binary_operators().len() + 1
                    );
                }
            }
        }
    }
});
