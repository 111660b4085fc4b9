use crate::prefix::Prefix;

use csv::StringRecord;
use std::collections::BTreeMap;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Country,
    Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLocation {
    pub country: String,
    pub state: String,
    pub city: String,
}

impl RowLocation {
    /// Columns 1-3 of a row, when they form a well-formed location.
    pub fn from_record(record: &StringRecord) -> Option<Self> {
        let country = record.get(1).unwrap_or_default().trim().to_uppercase();
        if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_alphabetic()) {
            return None;
        }
        let state = record.get(2).unwrap_or_default().trim().to_uppercase();
        // "US-MA" and bare "MA" both mean MA
        let state = match state.split('-').nth(1).map(str::to_owned) {
            Some(suffix) => suffix,
            None => state,
        };
        if state.len() > 5 {
            return None;
        }
        let city = record.get(3).unwrap_or_default().trim().to_owned();
        Some(Self { country, state, city })
    }

    pub fn grouping_key(&self, grouping: Grouping) -> String {
        match grouping {
            Grouping::Country => self.country.clone(),
            Grouping::Location => {
                [self.country.as_str(), self.state.as_str(), self.city.as_str()].join(",")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct SampleSet {
    pub representatives: BTreeMap<String, IpAddr>,
    pub by_country: BTreeMap<String, Vec<IpAddr>>,
}

impl SampleSet {
    pub fn visible_countries(&self) -> Vec<String> {
        self.by_country.keys().cloned().collect()
    }
}

/// A prefix that does not parse is logged and skipped; private or
/// location-malformed rows are dropped without noise. Duplicate grouping
/// keys keep the last row's sample.
pub fn collect_samples(feed_key: &str, rows: &[StringRecord], grouping: Grouping) -> SampleSet {
    let mut samples = SampleSet::default();
    for record in rows {
        let raw_prefix = record.get(0).unwrap_or_default().trim();
        let prefix: Prefix = match raw_prefix.parse() {
            Ok(prefix) => prefix,
            Err(error) => {
                log::warn!(r#"[{feed_key}] skipping row with prefix "{raw_prefix}": {error}"#);
                continue;
            }
        };
        let location = match RowLocation::from_record(record) {
            Some(location) => location,
            None => continue,
        };
        let key = location.grouping_key(grouping);
        log::debug!("[{feed_key}] location key {key}");
        if prefix.is_private() {
            continue;
        }
        let addr = prefix.sample_addr();
        samples
            .by_country
            .entry(location.country)
            .or_default()
            .push(addr);
        samples.representatives.insert(key, addr);
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    static CAPTURED_LOGS: Mutex<Vec<String>> = Mutex::new(Vec::new());

    struct CapturingLogger;

    impl log::Log for CapturingLogger {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            CAPTURED_LOGS.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    #[test]
    fn representative_is_first_usable_host() {
        let rows = [record(&["98.97.0.0/16", "US", "", ""])];
        let samples = collect_samples("test", &rows, Grouping::Location);
        let addr: IpAddr = "98.97.0.1".parse().unwrap();
        assert_eq!(
            samples.representatives,
            BTreeMap::from([("US,,".to_owned(), addr)])
        );
        assert_eq!(
            samples.by_country,
            BTreeMap::from([("US".to_owned(), vec![addr])])
        );
        assert_eq!(samples.visible_countries(), ["US"]);
    }

    #[test]
    fn country_grouping_uses_bare_code() {
        let rows = [record(&["98.97.0.0/16", "US", "US-WA", "Seattle"])];
        let samples = collect_samples("test", &rows, Grouping::Country);
        assert_eq!(
            samples.representatives.keys().collect::<Vec<_>>(),
            ["US"]
        );
    }

    #[test]
    fn location_key_holds_normalized_columns() {
        let rows = [record(&[" 98.97.0.0/16 ", " us ", "us-ma", " Boston "])];
        let samples = collect_samples("test", &rows, Grouping::Location);
        assert_eq!(
            samples.representatives.keys().collect::<Vec<_>>(),
            ["US,MA,Boston"]
        );
    }

    #[test]
    fn state_without_country_prefix_kept_as_is() {
        let location = RowLocation::from_record(&record(&["_", "AU", "QLD", "Brisbane"])).unwrap();
        assert_eq!(location.grouping_key(Grouping::Location), "AU,QLD,Brisbane");
    }

    #[test]
    fn private_rows_dropped() {
        let rows = [
            record(&["10.0.0.0/8", "US", "", ""]),
            record(&["192.168.0.0/16", "US", "", ""]),
            record(&["fd00::/8", "US", "", ""]),
        ];
        let samples = collect_samples("test", &rows, Grouping::Location);
        assert!(samples.representatives.is_empty());
        assert!(samples.visible_countries().is_empty());
    }

    #[test]
    fn location_key_logged_before_private_discard() {
        static LOGGER: CapturingLogger = CapturingLogger;
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        let rows = [record(&["10.0.0.0/8", "US", "US-WA", "Seattle"])];
        let samples = collect_samples("keylog", &rows, Grouping::Location);
        assert!(samples.representatives.is_empty());
        let captured = CAPTURED_LOGS.lock().unwrap();
        assert!(
            captured
                .iter()
                .any(|line| line == "[keylog] location key US,WA,Seattle"),
            "captured: {captured:?}"
        );
    }

    #[test]
    fn malformed_country_dropped() {
        for country in ["", "U", "USA", "1A", "U-"] {
            let rows = [record(&["98.97.0.0/16", country, "", ""])];
            let samples = collect_samples("test", &rows, Grouping::Location);
            assert!(samples.representatives.is_empty(), "country {country:?}");
        }
    }

    #[test]
    fn overlong_state_dropped() {
        let rows = [record(&["98.97.0.0/16", "US", "US-TOOLONG", ""])];
        let samples = collect_samples("test", &rows, Grouping::Location);
        assert!(samples.representatives.is_empty());
    }

    #[test]
    fn unparseable_prefix_skips_row_only() {
        let rows = [
            record(&["not-a-prefix", "US", "", ""]),
            record(&["98.97.0.0/16", "CA", "", ""]),
        ];
        let samples = collect_samples("test", &rows, Grouping::Location);
        assert_eq!(samples.visible_countries(), ["CA"]);
    }

    #[test]
    fn short_rows_dropped() {
        let rows = [record(&["98.97.0.0/16"])];
        let samples = collect_samples("test", &rows, Grouping::Location);
        assert!(samples.representatives.is_empty());
    }

    #[test]
    fn duplicate_key_keeps_last_sample() {
        let rows = [
            record(&["98.97.0.0/16", "US", "US-WA", "Seattle"]),
            record(&["146.75.0.0/16", "US", "US-WA", "Seattle"]),
        ];
        let samples = collect_samples("test", &rows, Grouping::Location);
        let last: IpAddr = "146.75.0.1".parse().unwrap();
        assert_eq!(
            samples.representatives,
            BTreeMap::from([("US,WA,Seattle".to_owned(), last)])
        );
        // both rows still contribute to the per-country sample list
        assert_eq!(samples.by_country["US"].len(), 2);
    }

    #[test]
    fn countries_accumulate_across_rows() {
        let rows = [
            record(&["98.97.0.0/16", "US", "US-WA", "Seattle"]),
            record(&["98.98.0.0/16", "US", "US-CA", "San Jose"]),
            record(&["146.75.0.0/16", "DE", "", "Berlin"]),
        ];
        let samples = collect_samples("test", &rows, Grouping::Location);
        assert_eq!(samples.visible_countries(), ["DE", "US"]);
        assert_eq!(samples.representatives.len(), 3);
        assert_eq!(samples.by_country["US"].len(), 2);
    }
}
