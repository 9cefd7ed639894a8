//! Scanner over JSON-lines table exports
//!
//! Each table is a `{table}.jsonl` file under the source directory, one
//! record per line. The continuation token is `{"offset": n}`, the number
//! of records already handed out.

use super::{Record, ScanPage, ScanToken, SourceScanner};
use crate::error::{MirrorError, MirrorResult};
use async_trait::async_trait;
use serde_json::json;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// Scanner reading `{table}.jsonl` files
pub struct JsonlScanner {
    root: PathBuf,
}

impl JsonlScanner {
    /// Create a scanner over the exports in `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn table_path(&self, table: &str) -> MirrorResult<PathBuf> {
        if table.is_empty() || table.contains(['/', '\\']) || table.contains("..") {
            return Err(MirrorError::SourceAccessDenied {
                table: table.to_string(),
            });
        }
        Ok(self.root.join(format!("{}.jsonl", table)))
    }

    fn parse_offset(table: &str, token: Option<&ScanToken>) -> MirrorResult<usize> {
        let Some(token) = token else {
            return Ok(0);
        };
        token
            .as_value()
            .get("offset")
            .and_then(|v| v.as_u64())
            .map(|offset| offset as usize)
            .ok_or_else(|| MirrorError::scan(table, format!("invalid continuation token {}", token.as_value())))
    }
}

#[async_trait]
impl SourceScanner for JsonlScanner {
    async fn scan(
        &self,
        table: &str,
        page_size: usize,
        token: Option<&ScanToken>,
    ) -> MirrorResult<ScanPage> {
        let path = self.table_path(table)?;
        let offset = Self::parse_offset(table, token)?;

        let file = File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => MirrorError::SourceTableNotFound {
                table: table.to_string(),
            },
            ErrorKind::PermissionDenied => MirrorError::SourceAccessDenied {
                table: table.to_string(),
            },
            _ => MirrorError::SourceUnreachable(format!("{}: {}", path.display(), e)),
        })?;

        let mut lines = BufReader::new(file).lines();
        let mut items: Vec<Record> = Vec::with_capacity(page_size);
        let mut seen = 0usize;
        let mut line_no = 0usize;
        let mut has_more = false;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| MirrorError::scan(table, e.to_string()))?
        {
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if seen < offset {
                seen += 1;
                continue;
            }

            if items.len() == page_size {
                has_more = true;
                break;
            }

            let record: Record = serde_json::from_str(trimmed)
                .map_err(|e| MirrorError::scan(table, format!("line {}: {}", line_no, e)))?;
            items.push(record);
        }

        let next_offset = offset + items.len();
        debug!(
            "Scanned {} records of {} from offset {}",
            items.len(),
            table,
            offset
        );

        Ok(ScanPage {
            items,
            next_token: has_more.then(|| ScanToken::new(json!({ "offset": next_offset }))),
        })
    }

    fn scanner_name(&self) -> &'static str {
        "jsonl"
    }
}
