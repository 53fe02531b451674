/// Feature flags selected once at startup and passed into every
/// pipeline stage.
///
/// The basic profile is the minimal language; the extras profile turns
/// every optional feature on. The CLI picks between them with
/// `--disable-extras`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub forbid_unused_variable: bool,
    pub forbid_uninitialized_variable: bool,
    pub allow_implicit_string_cast: bool,
    pub allow_static_methods: bool,
    pub allow_anonymous_functions: bool,
    pub allow_getters_in_classes: bool,
    pub allow_continue_keyword: bool,
    pub allow_ternary_operator: bool,
    pub allow_modulo_operator: bool,
    pub allow_arrays: bool,
}

impl Config {
    pub fn basic() -> Self {
        Self {
            forbid_unused_variable: false,
            forbid_uninitialized_variable: false,
            allow_implicit_string_cast: false,
            allow_static_methods: false,
            allow_anonymous_functions: false,
            allow_getters_in_classes: false,
            allow_continue_keyword: false,
            allow_ternary_operator: false,
            allow_modulo_operator: false,
            allow_arrays: false,
        }
    }

    pub fn extras() -> Self {
        Self {
            forbid_unused_variable: true,
            forbid_uninitialized_variable: true,
            allow_implicit_string_cast: true,
            allow_static_methods: true,
            allow_anonymous_functions: true,
            allow_getters_in_classes: true,
            allow_continue_keyword: true,
            allow_ternary_operator: true,
            allow_modulo_operator: true,
            allow_arrays: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::extras()
    }
}
