use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::ocr::OcrOptions;
use crate::paths;
use crate::unknown::UnknownOptions;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

const WINDOW_RANGE: (usize, usize) = (10, 200);
const NGRAM_RANGE: (usize, usize) = (3, 8);
const THRESHOLD_RANGE: (f64, f64) = (70.0, 100.0);
const DPI_RANGE: (u32, u32) = (72, 1200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Csv,
    Sheets,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckSettings {
    pub window: usize,
    pub context: usize,
    pub translation_context: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownSettings {
    pub zh_ngram_min: usize,
    pub zh_ngram_max: usize,
    pub zh_threshold: f64,
    pub en_threshold: f64,
    pub fuzzy: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrSettings {
    pub enabled: bool,
    pub min_chars: usize,
    pub languages: String,
    pub dpi: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub autosave: bool,
    pub backup: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetsSettings {
    pub spreadsheet: String,
    pub worksheet: String,
    pub token_env: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub check: CheckSettings,
    pub unknown: UnknownSettings,
    pub ocr: OcrSettings,
    pub store: StoreSettings,
    pub sheets: SheetsSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check: CheckSettings {
                window: 80,
                context: 60,
                translation_context: 100,
            },
            unknown: UnknownSettings {
                zh_ngram_min: 4,
                zh_ngram_max: 4,
                zh_threshold: 86.0,
                en_threshold: 88.0,
                fuzzy: true,
            },
            ocr: OcrSettings {
                enabled: false,
                min_chars: 5,
                languages: "chi_tra+eng".to_string(),
                dpi: 300,
            },
            store: StoreSettings {
                backend: StoreBackend::Csv,
                path: PathBuf::from("termbase_master.csv"),
                autosave: false,
                backup: true,
            },
            sheets: SheetsSettings {
                spreadsheet: String::new(),
                worksheet: "termbase_master".to_string(),
                token_env: "GOOGLE_SHEETS_TOKEN".to_string(),
                api_base: "https://sheets.googleapis.com/v4".to_string(),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    check: Option<CheckSection>,
    unknown: Option<UnknownSection>,
    ocr: Option<OcrSection>,
    store: Option<StoreSection>,
    sheets: Option<SheetsSection>,
}

#[derive(Debug, Default, Deserialize)]
struct CheckSection {
    window: Option<usize>,
    context: Option<usize>,
    translation_context: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct UnknownSection {
    zh_ngram_min: Option<usize>,
    zh_ngram_max: Option<usize>,
    zh_threshold: Option<f64>,
    en_threshold: Option<f64>,
    fuzzy: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSection {
    enabled: Option<bool>,
    min_chars: Option<usize>,
    languages: Option<String>,
    dpi: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct StoreSection {
    backend: Option<StoreBackend>,
    path: Option<String>,
    autosave: Option<bool>,
    backup: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsSection {
    spreadsheet: Option<String>,
    worksheet: Option<String>,
    token_env: Option<String>,
    api_base: Option<String>,
}

/// Merges the embedded defaults, `./settings.toml`, `./settings.local.toml`,
/// the same pair under the base directory, then `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge(parse_settings(DEFAULT_SETTINGS_TOML, Path::new("<embedded>"))?);
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = paths::base_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge(parse_settings(&content, &path)?);
            debug!(path = %path.display(), "settings merged");
        }
    }

    settings.clamp();
    Ok(settings)
}

fn parse_settings(content: &str, path: &Path) -> Result<SettingsFile> {
    toml::from_str(content)
        .with_context(|| format!("failed to parse settings: {}", path.display()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(check) = incoming.check {
            if let Some(window) = check.window {
                self.check.window = window;
            }
            if let Some(context) = check.context {
                self.check.context = context;
            }
            if let Some(context) = check.translation_context {
                self.check.translation_context = context;
            }
        }
        if let Some(unknown) = incoming.unknown {
            if let Some(min) = unknown.zh_ngram_min {
                self.unknown.zh_ngram_min = min;
            }
            if let Some(max) = unknown.zh_ngram_max {
                self.unknown.zh_ngram_max = max;
            }
            if let Some(threshold) = unknown.zh_threshold {
                self.unknown.zh_threshold = threshold;
            }
            if let Some(threshold) = unknown.en_threshold {
                self.unknown.en_threshold = threshold;
            }
            if let Some(fuzzy) = unknown.fuzzy {
                self.unknown.fuzzy = fuzzy;
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(enabled) = ocr.enabled {
                self.ocr.enabled = enabled;
            }
            if let Some(min_chars) = ocr.min_chars {
                self.ocr.min_chars = min_chars;
            }
            if let Some(languages) = non_empty(ocr.languages) {
                self.ocr.languages = languages.trim().to_string();
            }
            if let Some(dpi) = ocr.dpi {
                self.ocr.dpi = dpi;
            }
        }
        if let Some(store) = incoming.store {
            if let Some(backend) = store.backend {
                self.store.backend = backend;
            }
            if let Some(path) = non_empty(store.path) {
                self.store.path = PathBuf::from(path.trim());
            }
            if let Some(autosave) = store.autosave {
                self.store.autosave = autosave;
            }
            if let Some(backup) = store.backup {
                self.store.backup = backup;
            }
        }
        if let Some(sheets) = incoming.sheets {
            if let Some(spreadsheet) = sheets.spreadsheet {
                self.sheets.spreadsheet = spreadsheet.trim().to_string();
            }
            if let Some(worksheet) = non_empty(sheets.worksheet) {
                self.sheets.worksheet = worksheet.trim().to_string();
            }
            if let Some(token_env) = non_empty(sheets.token_env) {
                self.sheets.token_env = token_env.trim().to_string();
            }
            if let Some(api_base) = non_empty(sheets.api_base) {
                self.sheets.api_base = api_base.trim().trim_end_matches('/').to_string();
            }
        }
    }

    /// Pulls tunables back into the ranges the checks are calibrated for.
    pub fn clamp(&mut self) {
        self.check.window = self.check.window.clamp(WINDOW_RANGE.0, WINDOW_RANGE.1);
        let unknown = &mut self.unknown;
        unknown.zh_ngram_min = unknown.zh_ngram_min.clamp(NGRAM_RANGE.0, NGRAM_RANGE.1);
        unknown.zh_ngram_max = unknown
            .zh_ngram_max
            .clamp(NGRAM_RANGE.0, NGRAM_RANGE.1)
            .max(unknown.zh_ngram_min);
        unknown.zh_threshold = unknown.zh_threshold.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1);
        unknown.en_threshold = unknown.en_threshold.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1);
        self.ocr.dpi = self.ocr.dpi.clamp(DPI_RANGE.0, DPI_RANGE.1);
    }

    pub fn unknown_options(&self) -> UnknownOptions {
        UnknownOptions {
            zh_ngram_min: self.unknown.zh_ngram_min,
            zh_ngram_max: self.unknown.zh_ngram_max,
            en_threshold: self.unknown.en_threshold,
            zh_threshold: self.unknown.zh_threshold,
        }
    }

    pub fn ocr_options(&self) -> OcrOptions {
        OcrOptions {
            languages: self.ocr.languages.clone(),
            min_chars: self.ocr.min_chars,
            dpi: self.ocr.dpi,
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = paths::base_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}
