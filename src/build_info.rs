/// Short commit SHA of the build, when built from a git checkout.
pub fn git_sha() -> Option<&'static str> {
    option_env!("NLPLANNER_BUILD_GIT_SHA")
}

/// True when the checkout had uncommitted changes at build time.
pub fn dirty() -> bool {
    option_env!("NLPLANNER_BUILD_DIRTY").is_some()
}

/// Package version plus commit, e.g. `0.1.0 (3f2a9c1d0b7e)` or `0.1.0 (3f2a9c1d0b7e-dirty)`.
pub fn describe() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match git_sha() {
        Some(sha) if dirty() => format!("{version} ({sha}-dirty)"),
        Some(sha) => format!("{version} ({sha})"),
        None => version.to_string(),
    }
}
