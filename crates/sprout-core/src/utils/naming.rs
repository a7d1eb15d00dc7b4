//! Name mangling shared by the resolver and the build driver.

/// Upper-case a name and replace `-` with `_`, as used in environment
/// variable names (`CARGO_FEATURE_<F>`, `DEP_<LINKS>_<KEY>`)
pub fn envify(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Identifier form of a package name (`foo-bar` -> `foo_bar`)
pub fn crate_name(name: &str) -> String {
    name.replace('-', "_")
}
