use std::collections::HashMap;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::parser;
use crate::record::CaseRecord;
use crate::unit::WorkUnit;

pub const DEFAULT_BASE_URL: &str = "https://lawphil.net/judjuris/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Source of raw case records for one work unit.
pub trait Extractor {
    async fn extract(&self, unit: WorkUnit) -> Result<Vec<CaseRecord>, FetchError>;
}

/// Scrapes lawphil.net month listings and the case pages they link to.
pub struct LawPhilExtractor {
    client: reqwest::Client,
    base_url: String,
    request_delay: Duration,
}

impl LawPhilExtractor {
    pub fn new(base_url: &str, request_delay: Duration, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| FetchError::Permanent(format!("failed to build HTTP client: {}", e)))?;
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            client,
            base_url,
            request_delay,
        })
    }

    pub fn month_url(&self, unit: WorkUnit) -> String {
        let mon = unit.month.abbrev();
        format!(
            "{}juri{year}/{mon}{year}/{mon}{year}.html",
            self.base_url,
            year = unit.year,
            mon = mon
        )
    }

    /// GET with the politeness delay. `Ok(None)` on 404.
    async fn fetch_page(&self, url: &str) -> Result<Option<String>, FetchError> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("404 {}", url);
            return Ok(None);
        }
        let body = response.error_for_status()?.text().await?;
        debug!("GET {} ({} bytes, {}ms)", url, body.len(), start.elapsed().as_millis());
        Ok(Some(body))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb
    }
}

impl Extractor for LawPhilExtractor {
    async fn extract(&self, unit: WorkUnit) -> Result<Vec<CaseRecord>, FetchError> {
        let listing_url = self.month_url(unit);
        let Some(listing) = self.fetch_page(&listing_url).await? else {
            info!("No decisions published for {} ({})", unit, listing_url);
            return Ok(Vec::new());
        };

        let links = parser::parse_listing(&listing, &listing_url);
        info!("Found {} potential cases for {}", links.len(), unit);

        let pb = self.progress_bar(links.len());
        let mut records = Vec::with_capacity(links.len());
        for link in &links {
            pb.set_message(link.href.clone());
            match self.fetch_page(&link.url).await {
                Ok(Some(html)) => records.push(parser::parse_case(&html, &link.url, unit)),
                Ok(None) => warn!("Case page missing, skipping: {}", link.url),
                Err(FetchError::Permanent(e)) => warn!("Skipping {}: {}", link.url, e),
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        disambiguate_ids(&mut records);
        Ok(records)
    }
}

/// Case numbers can repeat within a month (e.g. a decision and a resolution);
/// later ones get a numeric suffix so every record keeps its own file.
pub fn disambiguate_ids(records: &mut [CaseRecord]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for record in records.iter_mut() {
        let id = record.case_id();
        let n = seen.entry(id.clone()).or_insert(0);
        *n += 1;
        if *n > 1 {
            record.rename(&format!("{}_{}", id, n));
        }
    }
}
