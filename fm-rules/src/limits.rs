/// Configurable safety floors for the path resolver and the regex guard.
///
/// All fields default to the values named in the specification. A host may
/// construct a stricter (or, for trusted input, looser) [`Limits`] and thread
/// it through [`crate::condition::parse_condition`],
/// [`crate::action::parse_action`] and [`crate::condition::eval::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of segments a parsed path may contain.
    pub max_path_depth: usize,
    /// Maximum length, in bytes, of a path's serialized form.
    pub max_path_length: usize,
    /// Maximum length, in bytes, of a regex pattern accepted by `~`.
    pub max_regex_length: usize,
    /// Wall-clock budget, in milliseconds, for a single regex match call.
    pub regex_timeout_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_path_depth: 50,
            max_path_length: 500,
            max_regex_length: 200,
            regex_timeout_ms: 500,
        }
    }
}
