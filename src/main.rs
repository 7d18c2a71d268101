fn main() {
    #[cfg(feature = "cli")]
    ipsdelta::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("ipsdelta: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
