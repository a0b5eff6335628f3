use anyhow::{Context, Result, anyhow};
use regex::Regex;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::json;
use std::sync::LazyLock;
use tracing::{debug, info};

use super::{StoreFuture, TermStore};
use crate::termbase::{Field, RawTable, TermTable};

static SHEET_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").expect("valid spreadsheet url regex")
});

const NEW_SHEET_ROWS: u32 = 1000;
const NEW_SHEET_COLUMNS: u32 = 10;

/// Accepts a spreadsheet URL or a bare spreadsheet ID.
pub fn extract_sheet_id(url_or_id: &str) -> String {
    let trimmed = url_or_id.trim();
    SHEET_URL
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// A worksheet in a Google spreadsheet, via the Sheets v4 REST API.
#[derive(Debug, Clone)]
pub struct SheetsStore {
    client: Client,
    api_base: Url,
    spreadsheet_id: String,
    worksheet: String,
    token: String,
}

impl SheetsStore {
    pub fn new(api_base: &str, spreadsheet: &str, worksheet: &str, token: &str) -> Result<Self> {
        let spreadsheet_id = extract_sheet_id(spreadsheet);
        if spreadsheet_id.is_empty() {
            return Err(anyhow!("spreadsheet id is empty"));
        }
        if worksheet.trim().is_empty() {
            return Err(anyhow!("worksheet name is empty"));
        }
        if token.trim().is_empty() {
            return Err(anyhow!("sheets access token is empty"));
        }
        let api_base = Url::parse(api_base.trim_end_matches('/'))
            .with_context(|| format!("invalid sheets api base: {}", api_base))?;
        Ok(Self {
            client: Client::new(),
            api_base,
            spreadsheet_id,
            worksheet: worksheet.trim().to_string(),
            token: token.trim().to_string(),
        })
    }

    fn range(&self) -> String {
        format!("'{}'", self.worksheet.replace('\'', "''"))
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("sheets api base cannot carry a path: {}", self.api_base))?
            .pop_if_empty()
            .push("spreadsheets")
            .extend(segments);
        Ok(url)
    }

    async fn check(response: Response, action: &str) -> Result<String> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            return Ok(text);
        }
        Err(anyhow!("Sheets API error ({}) while {}: {}", status, action, text))
    }

    /// Creates the worksheet with a header row when the spreadsheet lacks it.
    pub async fn ensure_worksheet(&self) -> Result<bool> {
        let url = self.url(&[&self.spreadsheet_id])?;
        let response = self
            .client
            .get(url)
            .query(&[("fields", "sheets.properties.title")])
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| "failed to reach the Sheets API")?;
        let text = Self::check(response, "reading spreadsheet").await?;
        let meta: SpreadsheetMeta =
            serde_json::from_str(&text).with_context(|| "failed to parse spreadsheet metadata")?;
        if meta
            .sheets
            .iter()
            .any(|sheet| sheet.properties.title == self.worksheet)
        {
            return Ok(false);
        }

        info!(worksheet = %self.worksheet, "creating worksheet");
        let url = self.url(&[&format!("{}:batchUpdate", self.spreadsheet_id)])?;
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": self.worksheet,
                        "gridProperties": {
                            "rowCount": NEW_SHEET_ROWS,
                            "columnCount": NEW_SHEET_COLUMNS
                        }
                    }
                }
            }]
        });
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .with_context(|| "failed to reach the Sheets API")?;
        Self::check(response, "creating worksheet").await?;

        let headers: Vec<String> = Field::ALL
            .iter()
            .map(|field| field.header().to_string())
            .collect();
        self.write_values(vec![headers]).await?;
        Ok(true)
    }

    async fn read_values(&self) -> Result<Vec<Vec<String>>> {
        let url = self.url(&[&self.spreadsheet_id, "values", &self.range()])?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| "failed to reach the Sheets API")?;
        let text = Self::check(response, "reading values").await?;
        let range: ValueRange =
            serde_json::from_str(&text).with_context(|| "failed to parse sheet values")?;
        Ok(range.values)
    }

    async fn clear_values(&self) -> Result<()> {
        let url = self.url(&[
            &self.spreadsheet_id,
            "values",
            &format!("{}:clear", self.range()),
        ])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({}))
            .send()
            .await
            .with_context(|| "failed to reach the Sheets API")?;
        Self::check(response, "clearing values").await?;
        Ok(())
    }

    async fn write_values(&self, values: Vec<Vec<String>>) -> Result<()> {
        let range = self.range();
        let url = self.url(&[&self.spreadsheet_id, "values", &range])?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });
        let response = self
            .client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .with_context(|| "failed to reach the Sheets API")?;
        Self::check(response, "writing values").await?;
        Ok(())
    }

    async fn load_table(&self) -> Result<RawTable> {
        self.ensure_worksheet().await?;
        let mut values = self.read_values().await?.into_iter();
        let Some(headers) = values.next() else {
            return Ok(RawTable::default());
        };
        let rows: Vec<Vec<String>> = values.collect();
        debug!(rows = rows.len(), "sheet values loaded");
        Ok(RawTable { headers, rows })
    }

    async fn save_table(&self, table: &TermTable) -> Result<()> {
        let raw = table.to_raw();
        let mut values = Vec::with_capacity(raw.rows.len() + 1);
        values.push(raw.headers);
        values.extend(raw.rows);
        self.clear_values().await?;
        self.write_values(values).await?;
        debug!(rows = table.len(), "sheet values saved");
        Ok(())
    }
}

impl TermStore for SheetsStore {
    fn describe(&self) -> String {
        format!("sheets:{}/{}", self.spreadsheet_id, self.worksheet)
    }

    fn load(&self) -> StoreFuture<'_, RawTable> {
        Box::pin(self.load_table())
    }

    fn save<'a>(&'a self, table: &'a TermTable) -> StoreFuture<'a, ()> {
        Box::pin(self.save_table(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_url_or_keeps_bare_id() {
        assert_eq!(
            extract_sheet_id("https://docs.google.com/spreadsheets/d/1AbC-d_9/edit#gid=0"),
            "1AbC-d_9"
        );
        assert_eq!(extract_sheet_id("  1AbC-d_9 "), "1AbC-d_9");
    }

    #[test]
    fn rejects_incomplete_configuration() {
        assert!(SheetsStore::new("https://sheets.googleapis.com/v4", "", "ws", "t").is_err());
        assert!(SheetsStore::new("https://sheets.googleapis.com/v4", "id", "ws", " ").is_err());
        assert!(SheetsStore::new("not a url", "id", "ws", "t").is_err());
    }

    #[test]
    fn urls_escape_the_worksheet_range() {
        let store =
            SheetsStore::new("https://sheets.googleapis.com/v4/", "abc", "term base", "t")
                .expect("store");
        let url = store
            .url(&["abc", "values", &store.range()])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'term%20base'"
        );
        assert_eq!(store.describe(), "sheets:abc/term base");
    }
}
