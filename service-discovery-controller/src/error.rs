/// What exit code `main` should use. Config/bus-startup failures are
/// treated as bad configuration (`exit 2`); everything else that keeps the
/// process from serving traffic is a runtime failure (`exit 1`).
#[derive(Debug)]
pub enum ExitError {
    Config(anyhow::Error),
    Runtime(anyhow::Error),
}

impl std::fmt::Display for ExitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitError::Config(error) => write!(f, "configuration error: {error:#}"),
            ExitError::Runtime(error) => write!(f, "runtime error: {error:#}"),
        }
    }
}
