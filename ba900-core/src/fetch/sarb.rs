//! SARB institution-data API client for the BA900 return.
//!
//! Two endpoints are used:
//! - `GET {base}/GetPeriods/BA900` returns a JSON array of period strings.
//! - `GET {base}/GetInstitutionData/BA900/{period}/TOTAL` returns a JSON
//!   envelope whose `XMLData` field holds the return as serialized XML.

use super::period::ReportingPeriod;
use super::provider::{FetchError, HttpResponse, HttpTransport};
use super::retry::{get_with_retry, RetryPolicy, Sleeper, ThreadSleeper};
use super::xml;
use crate::config::FetchConfig;
use crate::record::FieldMap;
use serde::Deserialize;

/// Return type queried on every call.
pub const RETURN_TYPE: &str = "BA900";

/// Institution code for the whole-sector aggregate.
pub const INSTITUTION_TOTAL: &str = "TOTAL";

/// Reserved field holding the source period of a record.
pub const PERIOD_FIELD: &str = "Period";

/// Envelope of the institution-data endpoint.
#[derive(Debug, Deserialize)]
struct InstitutionEnvelope {
    #[serde(rename = "XMLData", default)]
    xml_data: Option<String>,
}

/// One flattened BA900 return, tagged with its period.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub period: ReportingPeriod,
    pub fields: FieldMap,
}

impl RawRecord {
    /// Build a record from flattened fields; the `Period` field is set last
    /// and overwrites any leaf of the same name.
    pub fn new(period: ReportingPeriod, mut fields: FieldMap) -> Self {
        fields.insert(PERIOD_FIELD, Some(period.as_str().to_string()));
        Self { period, fields }
    }
}

/// Blocking `reqwest` transport with a fixed per-request timeout.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::blocking::Client::builder().timeout(config.timeout());
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let transport_err = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let resp = self.client.get(url).send().map_err(transport_err)?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(transport_err)?;
        Ok(HttpResponse { status, body })
    }
}

/// BA900 client: URL construction, retry, and payload decoding.
pub struct SarbClient {
    api_base: String,
    policy: RetryPolicy,
    transport: Box<dyn HttpTransport>,
    sleeper: Box<dyn Sleeper>,
}

impl SarbClient {
    /// Client backed by `reqwest` and real sleeps.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(
            config,
            Box::new(transport),
            Box::new(ThreadSleeper),
        ))
    }

    /// Client with an injected transport and sleeper.
    pub fn with_transport(
        config: &FetchConfig,
        transport: Box<dyn HttpTransport>,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            policy: RetryPolicy::from(config),
            transport,
            sleeper,
        }
    }

    pub fn periods_url(&self) -> String {
        format!("{}/GetPeriods/{RETURN_TYPE}", self.api_base)
    }

    pub fn institution_url(&self, period: &ReportingPeriod) -> String {
        format!(
            "{}/GetInstitutionData/{RETURN_TYPE}/{period}/{INSTITUTION_TOTAL}",
            self.api_base
        )
    }

    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        get_with_retry(self.transport.as_ref(), self.sleeper.as_ref(), &self.policy, url)
    }

    /// All periods the API offers for BA900, in the order returned.
    pub fn list_available_periods(&self) -> Result<Vec<ReportingPeriod>, FetchError> {
        let url = self.periods_url();
        let resp = self.get(&url)?;
        let raw: Vec<String> =
            serde_json::from_str(&resp.body).map_err(|e| FetchError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        raw.iter().map(|p| ReportingPeriod::parse(p)).collect()
    }

    /// Fetch and flatten the TOTAL return for one period.
    ///
    /// Returns `Ok(None)` when the envelope carries no XMLData.
    pub fn fetch_period_total(
        &self,
        period: &ReportingPeriod,
    ) -> Result<Option<RawRecord>, FetchError> {
        let url = self.institution_url(period);
        let resp = self.get(&url)?;
        let envelope: InstitutionEnvelope =
            serde_json::from_str(&resp.body).map_err(|e| FetchError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let xml_text = match envelope.xml_data {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(None),
        };

        let fields = xml::flatten(&xml_text).map_err(|reason| FetchError::Xml {
            period: period.to_string(),
            reason,
        })?;
        Ok(Some(RawRecord::new(period.clone(), fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    struct MapTransport(HashMap<String, HttpResponse>);

    impl HttpTransport for MapTransport {
        fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
            Ok(self
                .0
                .get(url)
                .cloned()
                .unwrap_or_else(|| HttpResponse::new(404, "")))
        }
    }

    struct NoSleep(RefCell<u32>);

    impl Sleeper for NoSleep {
        fn sleep(&self, _delay: Duration) {
            *self.0.borrow_mut() += 1;
        }
    }

    fn client(routes: &[(&str, u16, &str)]) -> SarbClient {
        let config = FetchConfig {
            api_base: "http://sarb.test/api/".into(),
            ..FetchConfig::default()
        };
        let map = routes
            .iter()
            .map(|(u, s, b)| (u.to_string(), HttpResponse::new(*s, *b)))
            .collect();
        SarbClient::with_transport(
            &config,
            Box::new(MapTransport(map)),
            Box::new(NoSleep(RefCell::new(0))),
        )
    }

    fn period(s: &str) -> ReportingPeriod {
        ReportingPeriod::parse(s).unwrap()
    }

    #[test]
    fn urls_follow_api_shape() {
        let c = client(&[]);
        assert_eq!(c.periods_url(), "http://sarb.test/api/GetPeriods/BA900");
        assert_eq!(
            c.institution_url(&period("2021-03-31")),
            "http://sarb.test/api/GetInstitutionData/BA900/2021-03-31/TOTAL"
        );
    }

    #[test]
    fn lists_periods() {
        let c = client(&[(
            "http://sarb.test/api/GetPeriods/BA900",
            200,
            r#"["2021-02-28","2021-01-31"]"#,
        )]);
        let periods = c.list_available_periods().unwrap();
        let raw: Vec<&str> = periods.iter().map(|p| p.as_str()).collect();
        assert_eq!(raw, vec!["2021-02-28", "2021-01-31"]);
    }

    #[test]
    fn non_array_period_list_is_decode_error() {
        let c = client(&[("http://sarb.test/api/GetPeriods/BA900", 200, r#"{"x":1}"#)]);
        assert!(matches!(
            c.list_available_periods(),
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn fetch_flattens_and_tags_period() {
        let c = client(&[(
            "http://sarb.test/api/GetInstitutionData/BA900/2021-03-31/TOTAL",
            200,
            r#"{"XMLData":"<r><Period>stale</Period><Total>5</Total></r>"}"#,
        )]);
        let record = c.fetch_period_total(&period("2021-03-31")).unwrap().unwrap();

        assert_eq!(record.fields.text("Total"), Some("5"));
        assert_eq!(record.fields.text(PERIOD_FIELD), Some("2021-03-31"));
        assert_eq!(record.period, period("2021-03-31"));
    }

    #[test]
    fn missing_or_empty_xml_is_skipped() {
        for body in [r#"{"XMLData":""}"#, r#"{"XMLData":null}"#, r#"{}"#] {
            let c = client(&[(
                "http://sarb.test/api/GetInstitutionData/BA900/2021-03-31/TOTAL",
                200,
                body,
            )]);
            assert!(
                c.fetch_period_total(&period("2021-03-31")).unwrap().is_none(),
                "{body} should be skipped"
            );
        }
    }

    #[test]
    fn permanent_status_propagates() {
        let c = client(&[]);
        let err = c.fetch_period_total(&period("2021-03-31")).unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert!(err.to_string().contains("2021-03-31"));
    }

    #[test]
    fn malformed_xml_names_period() {
        let c = client(&[(
            "http://sarb.test/api/GetInstitutionData/BA900/2021-03-31/TOTAL",
            200,
            r#"{"XMLData":"<r><a></r>"}"#,
        )]);
        let err = c.fetch_period_total(&period("2021-03-31")).unwrap_err();
        match err {
            FetchError::Xml { period, .. } => assert_eq!(period, "2021-03-31"),
            other => panic!("expected Xml error, got {other:?}"),
        }
    }
}
