#![no_main]
use libfuzzer_sys::fuzz_target;
use sdiff::{ApplyOptions, Patch, apply_bytes};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let _ = Patch::decode(data);
    let _ = apply_bytes(data, &[], &ApplyOptions::default());

    if data.len() >= 2 {
        let (base, patch) = data.split_at(data.len() / 2);
        let _ = apply_bytes(patch, base, &ApplyOptions { strict_length: true });
    }
});
