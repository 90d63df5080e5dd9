#![no_main]
use libfuzzer_sys::fuzz_target;
use sdiff::{DiffOptions, apply, diff_with_options};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks the lookahead and the split point.
    let lookahead = 1 + (data[0] as usize % 64);
    let payload = &data[1..];
    let (old, new) = payload.split_at(payload.len() / 2);

    let patch = diff_with_options(new, old, &DiffOptions { lookahead }).unwrap();
    let decoded = apply(&patch, old).unwrap();
    assert_eq!(decoded, new);
});
