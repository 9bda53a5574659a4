// Resolver configuration
use compact_str::CompactString;
use serde::Deserialize;

/// Options controlling how tables are resolved.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Label language for headers and sort keys.
    pub lang: CompactString,
    /// Axes are an entry context; empty open axes receive fact prototypes.
    pub editable: bool,
    /// Prototype rows added under an entry-row open node. `None` adds one row
    /// only when the node found no facts.
    pub open_breakdown_lines: Option<usize>,
    /// Substitute an empty value for failed non-critical evaluations.
    pub handle_exceptions: bool,
    pub check_tag_selectors: bool,
    pub check_definitions: bool,
    pub parallel: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lang: CompactString::new("en"),
            editable: true,
            open_breakdown_lines: None,
            handle_exceptions: false,
            check_tag_selectors: true,
            check_definitions: true,
            parallel: true,
        }
    }
}

impl ResolverConfig {
    /// Data entry: every open axis keeps one empty entry row.
    pub fn entry() -> Self {
        Self {
            open_breakdown_lines: Some(1),
            ..Self::default()
        }
    }

    /// Read-only rendering of reported facts.
    pub fn report() -> Self {
        Self {
            editable: false,
            handle_exceptions: true,
            ..Self::default()
        }
    }

    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = CompactString::from(lang);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_handle_exceptions(mut self, handle: bool) -> Self {
        self.handle_exceptions = handle;
        self
    }

    pub fn with_open_breakdown_lines(mut self, lines: Option<usize>) -> Self {
        self.open_breakdown_lines = lines;
        self
    }
}
