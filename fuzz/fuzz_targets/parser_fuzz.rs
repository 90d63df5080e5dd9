#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // NUL-separated argv, capped so clap sees realistic command lines.
    let args: Vec<String> = data
        .split(|b| *b == 0)
        .take(24)
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect();
    sdiff::cli::fuzz_try_parse_args(&args);
});
