use serde::Serialize;

use crate::ocr;
use crate::settings::Settings;

/// Optional subsystems, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// `tesseract` plus a page rasteriser are installed.
    pub ocr: bool,
    /// The fuzzy scorer was compiled in.
    pub fuzzy: bool,
    /// A spreadsheet and an access token are configured.
    pub remote_store: bool,
}

impl Capabilities {
    pub fn detect(settings: &Settings) -> Self {
        let token_present = std::env::var(&settings.sheets.token_env)
            .map(|token| !token.trim().is_empty())
            .unwrap_or(false);
        Self {
            ocr: ocr::is_available(),
            fuzzy: cfg!(feature = "fuzzy"),
            remote_store: token_present && !settings.sheets.spreadsheet.trim().is_empty(),
        }
    }

    pub fn none() -> Self {
        Self {
            ocr: false,
            fuzzy: false,
            remote_store: false,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        let status = |available: bool| if available { "available" } else { "unavailable" };
        vec![
            format!("ocr: {}", status(self.ocr)),
            format!("fuzzy: {}", status(self.fuzzy)),
            format!("remote_store: {}", status(self.remote_store)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_store_needs_spreadsheet_and_token() {
        let mut settings = Settings::default();
        settings.sheets.token_env = "TERMBASE_CHECK_TEST_TOKEN_UNSET_7731".to_string();
        settings.sheets.spreadsheet = "abc".to_string();
        let caps = Capabilities::detect(&settings);
        assert!(!caps.remote_store);
        assert_eq!(caps.fuzzy, cfg!(feature = "fuzzy"));
    }

    #[test]
    fn lines_report_each_subsystem() {
        let lines = Capabilities::none().lines();
        assert_eq!(
            lines,
            vec![
                "ocr: unavailable",
                "fuzzy: unavailable",
                "remote_store: unavailable"
            ]
        );
    }
}
