use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};

use crate::domain::{DATE_FORMAT, PageRecord, StoredPage};
use crate::error::WallpaperError;

const CREATE_PAGES: &str = "CREATE TABLE IF NOT EXISTS pages (
    pageId INTEGER PRIMARY KEY,
    country TEXT NOT NULL,
    date TEXT NOT NULL,
    pageUrl TEXT NOT NULL
)";

const CSV_COLUMNS: [&str; 4] = ["pageId", "country", "date", "pageUrl"];

pub struct PageRecordStore {
    conn: Connection,
}

impl PageRecordStore {
    pub fn open(path: &Utf8Path) -> Result<Self, WallpaperError> {
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| WallpaperError::Filesystem(err.to_string()))?;
            }
        }
        let conn = Connection::open(path.as_std_path())?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, WallpaperError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, WallpaperError> {
        conn.execute(CREATE_PAGES, [])?;
        Ok(Self { conn })
    }

    pub fn upsert_many(&mut self, records: &[PageRecord]) -> Result<usize, WallpaperError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO pages (pageId, country, date, pageUrl)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.page_id,
                    record.country,
                    record.date.format(DATE_FORMAT).to_string(),
                    record.page_url,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    pub fn select_all(&self) -> Result<BTreeMap<i64, StoredPage>, WallpaperError> {
        let mut stmt = self
            .conn
            .prepare("SELECT pageId, country, date FROM pages")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut pages = BTreeMap::new();
        for row in rows {
            let (page_id, country, date) = row?;
            pages.insert(
                page_id,
                StoredPage {
                    country,
                    date: parse_stored_date(page_id, &date)?,
                },
            );
        }
        Ok(pages)
    }

    pub fn latest_before(
        &self,
        country: &str,
        below: i64,
    ) -> Result<Option<(i64, NaiveDate)>, WallpaperError> {
        let row = self
            .conn
            .query_row(
                "SELECT pageId, date FROM pages
                 WHERE country = ?1 AND pageId < ?2
                 ORDER BY pageId DESC LIMIT 1",
                params![country, below],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        match row {
            Some((page_id, date)) => Ok(Some((page_id, parse_stored_date(page_id, &date)?))),
            None => Ok(None),
        }
    }

    pub fn prune(&mut self, keep: usize) -> Result<usize, WallpaperError> {
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);
        let deleted = self.conn.execute(
            "DELETE FROM pages WHERE pageId NOT IN (
                SELECT pageId FROM pages ORDER BY pageId DESC LIMIT ?1
            )",
            params![keep],
        )?;
        Ok(deleted)
    }

    pub fn len(&self) -> Result<usize, WallpaperError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // Rows whose page id is already stored are left alone.
    pub fn seed_from_csv(&mut self, path: &Utf8Path) -> Result<usize, WallpaperError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| WallpaperError::Filesystem(format!("read {path}: {err}")))?;
        let records = parse_seed_csv(&content)?;

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO pages (pageId, country, date, pageUrl)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in &records {
                inserted += stmt.execute(params![
                    record.page_id,
                    record.country,
                    record.date.format(DATE_FORMAT).to_string(),
                    record.page_url,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}

fn parse_stored_date(page_id: i64, value: &str) -> Result<NaiveDate, WallpaperError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|err| WallpaperError::Store(format!("page {page_id} has bad date {value}: {err}")))
}

pub fn parse_seed_csv(content: &str) -> Result<Vec<PageRecord>, WallpaperError> {
    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());
    let header = lines
        .next()
        .ok_or_else(|| WallpaperError::Store("seed CSV is empty or missing headers".to_string()))?;
    let names = header.split(',').map(str::trim).collect::<Vec<_>>();
    let mut index = [0usize; 4];
    for (slot, column) in index.iter_mut().zip(CSV_COLUMNS) {
        *slot = names
            .iter()
            .position(|name| *name == column)
            .ok_or_else(|| WallpaperError::Store(format!("seed CSV missing column {column}")))?;
    }

    let mut records = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let fields = line.split(',').map(str::trim).collect::<Vec<_>>();
        let field = |slot: usize| {
            fields.get(index[slot]).copied().ok_or_else(|| {
                WallpaperError::Store(format!("seed CSV row {} is short", line_no + 2))
            })
        };
        let page_id = field(0)?.parse::<i64>().map_err(|err| {
            WallpaperError::Store(format!("seed CSV row {}: {err}", line_no + 2))
        })?;
        let date = NaiveDate::parse_from_str(field(2)?, DATE_FORMAT).map_err(|err| {
            WallpaperError::Store(format!("seed CSV row {}: {err}", line_no + 2))
        })?;
        records.push(PageRecord {
            page_id,
            country: field(1)?.to_string(),
            date,
            page_url: field(3)?.to_string(),
        });
    }
    Ok(records)
}
