pub fn init() {
    // Later calls are no-ops; tests and examples share one subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug,notify=warn")
        .try_init();
}
