//! Row normalization
//!
//! Converts the string cells of a [`RawInventoryRow`] into an [`InventoryRow`]
//! with typed values. Normalization never fails: unusable values become
//! `None` (or [`YearValue::Invalid`]) and are reported later by the validator.

use super::row::RawInventoryRow;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Input format of the reception date column
pub const INPUT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Format reception dates are normalized to
pub const OUTPUT_DATE_FORMAT: &str = "%m/%d/%Y";

static STRICT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("date pattern is a valid regex")
});

/// Leading integer of a year cell; spreadsheets often export `2020.0`
static LEADING_INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+").expect("integer pattern is a valid regex"));

/// Model year as found in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearValue {
    /// Cell missing or blank
    Unset,
    /// Cell present but not starting with an integer
    Invalid,
    Year(i32),
}

impl YearValue {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => YearValue::Unset,
            Some(s) => LEADING_INTEGER
                .find(s)
                .and_then(|m| m.as_str().parse::<i32>().ok())
                .map_or(YearValue::Invalid, YearValue::Year),
        }
    }

    pub fn value(self) -> Option<i32> {
        match self {
            YearValue::Year(year) => Some(year),
            _ => None,
        }
    }
}

/// A CSV line after normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    pub model: Option<String>,
    pub year: YearValue,
    pub brand: Option<String>,
    pub inventory_type: Option<String>,
    pub serial_number: Option<String>,
    /// `MM/DD/YYYY`, or `None` when the cell was missing or not a strict
    /// `DD/MM/YYYY` calendar date
    pub reception_date: Option<String>,
    pub status: Option<String>,
    pub comments: Option<String>,
    pub images: Vec<String>,
}

impl From<RawInventoryRow> for InventoryRow {
    fn from(raw: RawInventoryRow) -> Self {
        Self {
            year: YearValue::parse(raw.year.as_deref()),
            reception_date: raw.reception_date.as_deref().and_then(convert_date_format),
            images: parse_images(raw.images.as_deref()),
            model: present(raw.model),
            brand: present(raw.brand),
            inventory_type: present(raw.inventory_type),
            serial_number: present(raw.serial_number),
            status: present(raw.status),
            comments: present(raw.comments),
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Convert a strict `DD/MM/YYYY` date to `MM/DD/YYYY`.
///
/// Blank input, any other layout and impossible dates (`31/02/2024`) all
/// yield `None`.
pub fn convert_date_format(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if !STRICT_DATE.is_match(input) {
        tracing::debug!("Rejected reception date '{}': expected DD/MM/YYYY", input);
        return None;
    }

    match NaiveDate::parse_from_str(input, INPUT_DATE_FORMAT) {
        Ok(date) => Some(date.format(OUTPUT_DATE_FORMAT).to_string()),
        Err(e) => {
            tracing::debug!("Rejected reception date '{}': {}", input, e);
            None
        }
    }
}

/// Parse a normalized `MM/DD/YYYY` date.
pub fn parse_normalized_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, OUTPUT_DATE_FORMAT).ok()
}

/// Parse the image list cell.
///
/// Spreadsheets export lists like `"['http://a','http://b']"`. One layer of
/// wrapping single quotes is stripped, the remaining single quotes become
/// double quotes and the result is read as a JSON array of strings.
pub fn parse_images(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    let unwrapped = if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };
    let json = unwrapped.replace('\'', "\"");

    match serde_json::from_str::<Vec<String>>(&json) {
        Ok(urls) => urls,
        Err(e) => {
            tracing::warn!("Could not parse image list '{}': {}", raw, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_convert_date_format() {
        assert_eq!(convert_date_format("15/01/2024").as_deref(), Some("01/15/2024"));
        assert_eq!(convert_date_format(" 29/02/2024 ").as_deref(), Some("02/29/2024"));
    }

    #[test]
    fn test_convert_date_format_rejects() {
        assert_eq!(convert_date_format(""), None);
        assert_eq!(convert_date_format("   "), None);
        assert_eq!(convert_date_format("2024-01-15"), None);
        assert_eq!(convert_date_format("1/1/2024"), None);
        assert_eq!(convert_date_format("31/02/2024"), None);
        assert_eq!(convert_date_format("29/02/2023"), None);
        assert_eq!(convert_date_format("15/13/2024"), None);
    }

    #[test]
    fn test_parse_images_spreadsheet_list() {
        assert_eq!(
            parse_images(Some("['http://a','http://b']")),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
        assert_eq!(
            parse_images(Some("'[\"http://a\"]'")),
            vec!["http://a".to_string()]
        );
    }

    #[test]
    fn test_parse_images_invalid_is_empty() {
        assert!(parse_images(Some("['http://a'")).is_empty());
        assert!(parse_images(Some("http://a")).is_empty());
        assert!(parse_images(Some("{'url':'http://a'}")).is_empty());
        assert!(parse_images(Some("[1, 2]")).is_empty());
        assert!(parse_images(Some("")).is_empty());
        assert!(parse_images(None).is_empty());
    }

    #[test]
    fn test_year_value() {
        assert_eq!(YearValue::parse(Some("2020")), YearValue::Year(2020));
        assert_eq!(YearValue::parse(Some(" 2020 ")), YearValue::Year(2020));
        assert_eq!(YearValue::parse(Some("")), YearValue::Unset);
        assert_eq!(YearValue::parse(None), YearValue::Unset);
        assert_eq!(YearValue::parse(Some("dos mil")), YearValue::Invalid);
        assert_eq!(YearValue::parse(Some("2020.0")), YearValue::Year(2020));
        assert_eq!(YearValue::parse(Some("2020a")), YearValue::Year(2020));
        assert_eq!(YearValue::parse(Some("a2020")), YearValue::Invalid);
        assert_eq!(YearValue::parse(Some("99999999999")), YearValue::Invalid);
        assert_eq!(YearValue::Invalid.value(), None);
    }

    #[test]
    fn test_from_raw_row() {
        let raw = RawInventoryRow {
            model: Some(" Hilux ".to_string()),
            year: Some("2020".to_string()),
            brand: Some("Toyota".to_string()),
            inventory_type: Some("   ".to_string()),
            serial_number: Some("SN-1".to_string()),
            reception_date: Some("2024/01/15".to_string()),
            status: Some("ALTA".to_string()),
            comments: None,
            images: Some("['http://a']".to_string()),
        };

        let row = InventoryRow::from(raw);

        assert_eq!(row.model.as_deref(), Some("Hilux"));
        assert_eq!(row.year, YearValue::Year(2020));
        assert_eq!(row.inventory_type, None);
        assert_eq!(row.reception_date, None);
        assert_eq!(row.comments, None);
        assert_eq!(row.images, vec!["http://a".to_string()]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Every real calendar date in DD/MM/YYYY comes out as MM/DD/YYYY.
        #[test]
        fn property_valid_dates_swap_day_and_month(
            year in 1000i32..=9999,
            month in 1u32..=12,
            day in 1u32..=28,
        ) {
            let input = format!("{:02}/{:02}/{:04}", day, month, year);
            let expected = format!("{:02}/{:02}/{:04}", month, day, year);
            prop_assert_eq!(convert_date_format(&input), Some(expected.clone()));
            prop_assert!(parse_normalized_date(&expected).is_some());
        }

        /// Anything outside the strict layout is dropped.
        #[test]
        fn property_non_strict_dates_are_none(input in "[0-9/-]{0,12}") {
            prop_assume!(!STRICT_DATE.is_match(input.trim()));
            prop_assert_eq!(convert_date_format(&input), None);
        }

        /// Quoted URL lists parse back to the same URLs.
        #[test]
        fn property_quoted_lists_parse(urls in proptest::collection::vec("http://[a-z]{1,10}\\.com/[a-z0-9]{0,8}", 0..5)) {
            let cell = format!(
                "[{}]",
                urls.iter().map(|u| format!("'{}'", u)).collect::<Vec<_>>().join(",")
            );
            prop_assert_eq!(parse_images(Some(&cell)), urls);
        }

        /// The image parser never panics and always returns a list.
        #[test]
        fn property_image_parser_total(cell in ".{0,40}") {
            let _ = parse_images(Some(&cell));
        }
    }
}
