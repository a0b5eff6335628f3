use anyhow::Result;
use tracing::{error, info};

use crate::capabilities::Capabilities;
use crate::settings::{Settings, StoreBackend};
use crate::store::{CsvStore, SheetsStore, TermStore};
use crate::termbase::{TermRecord, TermTable, normalize_table};

/// The working termbase and the store it is persisted to.
pub struct Session {
    table: TermTable,
    store: Box<dyn TermStore>,
    autosave: bool,
    warnings: Vec<String>,
}

impl Session {
    /// Opens the configured backend. A remote store that is unavailable or
    /// fails to load falls back to the local CSV file with a warning.
    pub async fn open(settings: &Settings, capabilities: &Capabilities) -> Result<Self> {
        let local = || CsvStore::new(&settings.store.path, settings.store.backup);
        let autosave = settings.store.autosave;
        if settings.store.backend == StoreBackend::Csv {
            return Self::with_store(Box::new(local()), autosave).await;
        }

        let reason = if !capabilities.remote_store {
            format!(
                "remote store not configured (set sheets.spreadsheet and ${})",
                settings.sheets.token_env
            )
        } else {
            match open_sheets(settings).await {
                Ok(session) => return Ok(session),
                Err(err) => format!("{:#}", err),
            }
        };
        error!("remote store unavailable: {}", reason);
        let mut session = Self::with_store(Box::new(local()), autosave).await?;
        session.warnings.insert(
            0,
            format!(
                "remote store unavailable ({}); using {}",
                reason,
                session.store.describe()
            ),
        );
        Ok(session)
    }

    pub async fn with_store(store: Box<dyn TermStore>, autosave: bool) -> Result<Self> {
        let raw = store.load().await?;
        let normalized = normalize_table(&raw);
        info!(
            store = %store.describe(),
            terms = normalized.table.len(),
            "termbase loaded"
        );
        Ok(Self {
            table: normalized.table,
            store,
            autosave,
            warnings: normalized.warnings,
        })
    }

    pub fn table(&self) -> &TermTable {
        &self.table
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn describe_store(&self) -> String {
        self.store.describe()
    }

    /// Returns how many of `records` were not already in the table.
    pub fn append(&mut self, records: Vec<TermRecord>) -> usize {
        self.table.extend(records)
    }

    pub async fn save(&self) -> Result<()> {
        self.store.save(&self.table).await?;
        info!(store = %self.store.describe(), terms = self.table.len(), "termbase saved");
        Ok(())
    }

    /// Saves only when autosave is on. Returns whether it saved.
    pub async fn commit(&self) -> Result<bool> {
        if !self.autosave {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }
}

async fn open_sheets(settings: &Settings) -> Result<Session> {
    let token = std::env::var(&settings.sheets.token_env).unwrap_or_default();
    let store = SheetsStore::new(
        &settings.sheets.api_base,
        &settings.sheets.spreadsheet,
        &settings.sheets.worksheet,
        &token,
    )?;
    Session::with_store(Box::new(store), settings.store.autosave).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn local_settings(dir: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.store.path = dir.join("termbase.csv");
        settings.store.backup = false;
        settings
    }

    #[tokio::test]
    async fn append_save_and_reopen() {
        let dir = tempdir().expect("tempdir");
        let settings = local_settings(dir.path());
        let caps = Capabilities::none();

        let mut session = Session::open(&settings, &caps).await.expect("open");
        assert!(session.table().is_empty());
        assert!(session.warnings().is_empty());
        let added = session.append(vec![
            TermRecord::new("CT", "電腦斷層"),
            TermRecord::new("CT", "電腦斷層"),
        ]);
        assert_eq!(added, 1);
        assert!(!session.commit().await.expect("commit"));
        session.save().await.expect("save");

        let reopened = Session::open(&settings, &caps).await.expect("reopen");
        assert_eq!(reopened.table(), session.table());
    }

    #[tokio::test]
    async fn autosave_commits() {
        let dir = tempdir().expect("tempdir");
        let mut settings = local_settings(dir.path());
        settings.store.autosave = true;
        let mut session = Session::open(&settings, &Capabilities::none())
            .await
            .expect("open");
        session.append(vec![TermRecord::new("MRI", "磁振造影")]);
        assert!(session.commit().await.expect("commit"));
        assert!(settings.store.path.exists());
    }

    #[tokio::test]
    async fn unavailable_remote_store_falls_back_to_csv() {
        let dir = tempdir().expect("tempdir");
        let mut settings = local_settings(dir.path());
        settings.store.backend = StoreBackend::Sheets;
        settings.sheets.spreadsheet = "abc".to_string();
        settings.sheets.token_env = "TERMBASE_CHECK_TEST_TOKEN_UNSET_7731".to_string();

        let session = Session::open(&settings, &Capabilities::none())
            .await
            .expect("open");
        assert!(session.describe_store().starts_with("csv:"));
        assert!(session.warnings()[0].contains("remote store unavailable"));

        let caps = Capabilities {
            remote_store: true,
            ..Capabilities::none()
        };
        let session = Session::open(&settings, &caps).await.expect("open");
        assert!(session.describe_store().starts_with("csv:"));
        assert!(session.warnings()[0].contains("token is empty"));
    }
}
