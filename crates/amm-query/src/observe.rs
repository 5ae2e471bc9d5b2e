use tracing_subscriber::EnvFilter;

/// Installs a stderr `fmt` subscriber and routes panics through `tracing`.
/// Only the first call has an effect.
pub fn initialize(env_filter: &str) {
    let installed = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(env_filter))
        .try_init()
        .is_ok();
    if installed {
        set_panic_hook();
    }
}

fn set_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let name = thread.name().unwrap_or("<unnamed>");
        tracing::error!("thread '{name}' {info}");
        default_hook(info);
    }));
}
