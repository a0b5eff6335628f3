use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

use crate::termbase::{RawTable, TermTable};

mod csv;
mod sheets;

pub use self::csv::{CsvStore, read_csv_table, write_csv_table};
pub use self::sheets::{SheetsStore, extract_sheet_id};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Where the termbase lives between runs.
pub trait TermStore: Send + Sync {
    /// Human-readable location, for logs and the CLI.
    fn describe(&self) -> String;
    fn load(&self) -> StoreFuture<'_, RawTable>;
    /// Replaces the stored table with `table`.
    fn save<'a>(&'a self, table: &'a TermTable) -> StoreFuture<'a, ()>;
}
