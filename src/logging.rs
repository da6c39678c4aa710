use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

pub fn setup_tracing(verbosity_level: u8) {
    let filter = match verbosity_level {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let mut env_filter = EnvFilter::builder()
        .with_default_directive(filter.into())
        .from_env_lossy();

    // simulated wheel chatter is only interesting at trace
    if verbosity_level < 2 {
        if let Ok(directive) = "arena_nav::driver=info".parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer().pretty())
        .with(env_filter)
        .init();
}
