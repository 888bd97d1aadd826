#![no_main]

use libfuzzer_sys::fuzz_target;
use promsource::expr::{extract_all, split_expression_blocks};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed input must come back as a failure, never a panic
        let blocks = split_expression_blocks(input);
        let extraction = extract_all(&blocks);
        assert!(extraction.failures.len() <= blocks.len());
    }
});
