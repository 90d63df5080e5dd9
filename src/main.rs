fn main() {
    #[cfg(feature = "cli")]
    sdiff::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("sdiff: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
