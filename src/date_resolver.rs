use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{NaiveDate, TimeDelta};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::domain::PageRecord;
use crate::error::WallpaperError;
use crate::page_store::PageRecordStore;
use crate::providers::peapix::PeapixRecord;

pub const DEFAULT_KEEP_COUNT: usize = 84;
pub const MIN_KEEP_COUNT: usize = 24;
pub const DERIVED_PAGE_URL_PREFIX: &str = "https://peapix.com/bing/";

static PAGE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/bing/(\d+)(?:/|$)").expect("static page id pattern"));

pub fn extract_page_id(page_url: &str) -> Result<i64, WallpaperError> {
    PAGE_ID_RE
        .captures(page_url)
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse::<i64>().ok())
        .ok_or_else(|| WallpaperError::InvalidPageUrl(page_url.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    pub page_id: i64,
    pub country: String,
    pub date: NaiveDate,
    pub record: PeapixRecord,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub records: Vec<ResolvedRecord>,
    pub cycle_length: i64,
    pub cadence_changed: bool,
    pub persisted: usize,
    pub pruned: usize,
}

/// Infers calendar dates for dateless records from the spacing of their page
/// ids and the latest stored record of the same country.
///
/// Assumes every country advances one page id per cycle each day. When the
/// provider changes its interleaving without the batch span showing it, the
/// inferred dates drift; only an uneven span is detected.
#[derive(Debug, Clone)]
pub struct DateResolver {
    countries: Vec<String>,
}

impl DateResolver {
    pub fn new(countries: Vec<String>) -> Self {
        Self { countries }
    }

    pub fn resolve(
        &self,
        records: Vec<PeapixRecord>,
        country: &str,
        store: &mut PageRecordStore,
    ) -> Result<Resolution, WallpaperError> {
        let existing = store.select_all()?;

        let mut indexed = Vec::with_capacity(records.len());
        for record in records {
            match extract_page_id(&record.page_url) {
                Ok(page_id) => indexed.push((page_id, record)),
                Err(err) => {
                    warn!(page_url = %record.page_url, error = %err, "skipping record");
                }
            }
        }
        indexed.sort_by(|a, b| b.0.cmp(&a.0));

        if indexed.len() < 2 {
            return Err(WallpaperError::InferenceUnavailable(format!(
                "only {} usable record(s) for country '{country}', cannot infer cycle length",
                indexed.len()
            )));
        }

        let max_id = indexed[0].0;
        let min_id = indexed[indexed.len() - 1].0;
        let span = max_id - min_id;
        let steps = (indexed.len() - 1) as i64;
        let cycle_length = span / steps;
        if cycle_length == 0 {
            return Err(WallpaperError::InferenceUnavailable(format!(
                "page ids {min_id}..={max_id} do not advance across {} records",
                indexed.len()
            )));
        }

        let (base_id, base_date) = store.latest_before(country, max_id)?.ok_or_else(|| {
            WallpaperError::InferenceUnavailable(format!(
                "no baseline date stored before page id {max_id} for country '{country}'"
            ))
        })?;
        debug!(cycle_length, max_id, base_id, %base_date, "calibration baseline");

        let mut resolved = Vec::with_capacity(indexed.len());
        for (page_id, record) in indexed {
            let offset_days = (page_id - base_id).div_euclid(cycle_length);
            let date = TimeDelta::try_days(offset_days)
                .and_then(|delta| base_date.checked_add_signed(delta))
                .ok_or_else(|| {
                    WallpaperError::InferenceUnavailable(format!(
                        "page id {page_id} is {offset_days} days from baseline, out of range"
                    ))
                })?;
            resolved.push(ResolvedRecord {
                page_id,
                country: country.to_string(),
                date,
                record,
            });
        }

        let observed = resolved
            .iter()
            .map(|item| PageRecord {
                page_id: item.page_id,
                country: item.country.clone(),
                date: item.date,
                page_url: item.record.page_url.clone(),
            })
            .collect::<Vec<_>>();

        if span % steps != 0 {
            info!(
                span,
                steps, "page id span is uneven, cadence changed; storing observed records only"
            );
            let persisted = store.upsert_many(&observed)?;
            return Ok(Resolution {
                records: resolved,
                cycle_length,
                cadence_changed: true,
                persisted,
                pruned: 0,
            });
        }

        let Some(country_index) = self.countries.iter().position(|c| c == country) else {
            warn!(country, "country missing from configured list; skipping sibling synthesis");
            let persisted = store.upsert_many(&observed)?;
            return Ok(Resolution {
                records: resolved,
                cycle_length,
                cadence_changed: false,
                persisted,
                pruned: 0,
            });
        };

        let mut synthesized = BTreeMap::new();
        for item in &observed {
            for (index, sibling) in self.countries.iter().enumerate() {
                let derived_id = item.page_id - (country_index as i64 - index as i64);
                if existing.contains_key(&derived_id) {
                    continue;
                }
                let page_url = if derived_id == item.page_id {
                    item.page_url.clone()
                } else {
                    format!("{DERIVED_PAGE_URL_PREFIX}{derived_id}")
                };
                synthesized.entry(derived_id).or_insert_with(|| PageRecord {
                    page_id: derived_id,
                    country: sibling.clone(),
                    date: item.date,
                    page_url,
                });
            }
        }

        let synthesized = synthesized.into_values().collect::<Vec<_>>();
        let persisted = store.upsert_many(&synthesized)?;
        let keep = DEFAULT_KEEP_COUNT.max(cycle_length as usize * resolved.len());
        let pruned = if keep > MIN_KEEP_COUNT {
            store.prune(keep)?
        } else {
            0
        };
        debug!(persisted, keep, pruned, "page store updated");

        Ok(Resolution {
            records: resolved,
            cycle_length,
            cadence_changed: false,
            persisted,
            pruned,
        })
    }
}
