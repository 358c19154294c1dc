use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PDDIKTI_LOG";

pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    }
}

/// `PDDIKTI_LOG` wins over `RUST_LOG`, which wins over the verbosity flags.
pub fn init(verbose: bool, quiet: bool) {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbose, quiet)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(default_directive(true, true), "debug");
        assert_eq!(default_directive(false, true), "error");
        assert_eq!(default_directive(false, false), "info");
    }
}
