use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::cache::TtlCache;
use crate::consumption::ChartSeries;
use crate::fetch_error::FetchError;
use crate::meter::MeterTable;
use crate::price::TrafficPrice;

pub const DEFAULT_BASE_URL: &str = "https://ems003.enocoo.com:48889/";

const LOGIN_PATH: &str = "signinForm.php";
const RESIDENCE_PATH: &str = "php/ownConsumption.php";
const METER_TABLE_PATH: &str = "php/newMeterTable.php";
const TRAFFIC_LIGHT_PATH: &str = "php/getTrafficLightStatus.php";
const CHART_PATH: &str = "php/getMeterDataWithParam.php";
const SESSION_COOKIE: &str = "PHPSESSID";

static RESIDENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"var chosenResidenceId = "(.*?)";"#).expect("residence pattern is valid")
});

/// Session-cookie client for the building-management portal.
///
/// The session lives in reqwest's cookie store. The meter table is memoized
/// for `cache_ttl` so that several sensors refreshed in one window share a download.
#[derive(Clone)]
pub struct EvohausClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    meter_cache: Arc<Mutex<TtlCache<NaiveDate, MeterTable>>>,
}

impl EvohausClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
        cache_ttl: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            meter_cache: Arc::new(Mutex::new(TtlCache::new(cache_ttl))),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Open a session: fetch the sign-in form for a session cookie, then post credentials.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn login(&self) -> Result<(), FetchError> {
        let url = self.url(LOGIN_PATH);
        debug!("Requesting sign-in form");
        let response = self
            .client
            .get(&url)
            .query(&[("mode", "ok")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Login(format!(
                "sign-in form returned {}",
                response.status()
            )));
        }
        if response.cookies().any(|c| c.name() == SESSION_COOKIE) {
            debug!("Received new {} cookie", SESSION_COOKIE);
        } else {
            debug!("No new {} cookie, reusing stored session", SESSION_COOKIE);
        }

        let response = self
            .client
            .post(&url)
            .query(&[("mode", "ok")])
            .form(&[("user", self.username.as_str()), ("passwort", self.password.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Login(format!(
                "credentials rejected with {}",
                response.status()
            )));
        }

        info!("Logged in to portal");
        Ok(())
    }

    /// `login` with exponential backoff; the portal drops sessions under load.
    pub async fn login_with_retry(&self) -> Result<(), FetchError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(10))
            .with_max_times(3);

        (|| async { self.login().await })
            .retry(backoff)
            .notify(|err: &FetchError, delay: Duration| {
                warn!("Login failed: {}, retrying in {:?}", err, delay);
            })
            .await
    }

    /// Residence id from the consumption page script, falling back to the
    /// username prefix (`<residence>_<user>`).
    #[instrument(skip(self))]
    pub async fn fetch_residence_id(&self) -> Result<String, FetchError> {
        match self.fetch_text_get(RESIDENCE_PATH).await {
            Ok(html) => {
                if let Some(id) = parse_residence_id(&html) {
                    debug!("Residence id from portal script: {}", id);
                    return Ok(id);
                }
                warn!("No chosenResidenceId in consumption page, using username prefix");
            }
            Err(e) => warn!("Failed to load consumption page: {}, using username prefix", e),
        }

        residence_from_username(&self.username).ok_or(FetchError::MissingResidence)
    }

    /// Meter table for `date`. An empty body means the session expired: log in
    /// again and retry once.
    #[instrument(skip(self), fields(date = %date))]
    pub async fn fetch_meter_table(&self, date: NaiveDate) -> Result<MeterTable, FetchError> {
        let mut html = self.post_meter_table(date).await?;
        if html.trim().is_empty() {
            warn!("Empty meter table response, renewing session");
            self.login_with_retry().await?;
            html = self.post_meter_table(date).await?;
        }
        if html.trim().is_empty() {
            return Err(FetchError::EmptyResponse(METER_TABLE_PATH.to_string()));
        }

        MeterTable::from_html(&html)
    }

    /// `fetch_meter_table` behind the TTL cache. A different `date` is a miss.
    pub async fn fetch_meter_table_cached(&self, date: NaiveDate) -> Result<MeterTable, FetchError> {
        let mut cache = self.meter_cache.lock().await;
        cache
            .get_or_try_insert_with(date, || self.fetch_meter_table(date))
            .await
    }

    pub async fn invalidate_cache(&self) {
        self.meter_cache.lock().await.invalidate();
    }

    #[instrument(skip(self))]
    pub async fn fetch_traffic_price(&self) -> Result<TrafficPrice, FetchError> {
        let body = self.fetch_text_get(TRAFFIC_LIGHT_PATH).await?;
        TrafficPrice::from_json(&body)
    }

    #[instrument(skip(self), fields(category = %category, date = %date))]
    pub async fn fetch_chart_series(
        &self,
        category: &str,
        date: NaiveDate,
        residence_id: &str,
    ) -> Result<ChartSeries, FetchError> {
        let day = date.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(self.url(CHART_PATH))
            .query(&[
                ("from", day.as_str()),
                ("intVal", "Tag"),
                ("mClass", category),
                ("AreaId", residence_id),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        debug!("Retrieved chart series, size: {} bytes", body.len());
        ChartSeries::from_json(&body)
    }

    async fn post_meter_table(&self, date: NaiveDate) -> Result<String, FetchError> {
        let day = date.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .post(self.url(METER_TABLE_PATH))
            .form(&[("dateParam", day.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let html = response.text().await?;
        debug!("Retrieved meter table, size: {} bytes", html.len());
        Ok(html)
    }

    async fn fetch_text_get(&self, path: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Find `var chosenResidenceId = "...";` in any inline script.
pub fn parse_residence_id(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let script_selector = Selector::parse("script").ok()?;

    document.select(&script_selector).find_map(|script| {
        let body = script.text().collect::<String>();
        RESIDENCE_RE
            .captures(&body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|id| !id.is_empty())
    })
}

pub fn residence_from_username(username: &str) -> Option<String> {
    username
        .split('_')
        .next()
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_string)
}
