pub mod isometry;
pub mod stack;
pub mod taxonomy;

/// Canonical meme form: trimmed, uppercased. All comparison happens on
/// normalized names so catalog content can author "Tropical" and "TROPICAL"
/// interchangeably.
pub(crate) fn normalize(name: &str) -> String {
    name.trim().to_uppercase()
}

/// `!NAME` forbids NAME from accumulating alongside it.
pub(crate) fn is_anti(name: &str) -> bool {
    name.starts_with('!')
}

/// `$NAME` may accumulate at most once per stack.
pub(crate) fn is_unique(name: &str) -> bool {
    name.starts_with('$')
}

/// The name with any `!`/`$` prefix stripped.
pub(crate) fn base(name: &str) -> &str {
    name.strip_prefix(['!', '$']).unwrap_or(name)
}
