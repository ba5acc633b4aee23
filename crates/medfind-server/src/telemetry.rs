//! Tracing subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directives for a `-v` count. `RUST_LOG` overrides them.
pub fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,medfind_core=info,medfind_server=info",
        1 => "info,medfind_core=debug,medfind_server=debug",
        2 => "debug,medfind_core=trace,medfind_server=trace",
        _ => "trace",
    }
}

/// Install the global subscriber. Logs go to stderr.
pub fn init_tracing(verbose: u8, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_parse() {
        for verbose in 0..=3 {
            assert!(default_filter(verbose).parse::<EnvFilter>().is_ok());
        }
    }
}
