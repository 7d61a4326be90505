use tracing_subscriber::EnvFilter;

/// Console logs go to stderr so stdout only carries the command report.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("ced_crawler=debug,info")
    } else {
        EnvFilter::try_from_env("CED_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
