//! CSV ingestion
//!
//! Turns an uploaded spreadsheet export into [`RawInventoryRow`]s keyed by
//! the Spanish column labels operators see in their templates.

use serde::Deserialize;

/// Column labels of the import template, in template order.
pub mod headers {
    pub const MODEL: &str = "Nombre del Modelo";
    pub const YEAR: &str = "Año del Modelo";
    pub const BRAND: &str = "Marca del Inventario";
    pub const TYPE: &str = "Tipo de Inventario";
    pub const SERIAL_NUMBER: &str = "Número de Serie";
    pub const RECEPTION_DATE: &str = "Fecha de Recepción";
    pub const STATUS: &str = "Estado";
    pub const COMMENTS: &str = "Comentarios";
    pub const IMAGES: &str = "Imágenes";

    pub const ALL: [&str; 9] = [
        MODEL,
        YEAR,
        BRAND,
        TYPE,
        SERIAL_NUMBER,
        RECEPTION_DATE,
        STATUS,
        COMMENTS,
        IMAGES,
    ];
}

/// One CSV data line exactly as read. Empty or missing cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawInventoryRow {
    #[serde(rename = "Nombre del Modelo", default)]
    pub model: Option<String>,
    #[serde(rename = "Año del Modelo", default)]
    pub year: Option<String>,
    #[serde(rename = "Marca del Inventario", default)]
    pub brand: Option<String>,
    #[serde(rename = "Tipo de Inventario", default)]
    pub inventory_type: Option<String>,
    #[serde(rename = "Número de Serie", default)]
    pub serial_number: Option<String>,
    #[serde(rename = "Fecha de Recepción", default)]
    pub reception_date: Option<String>,
    #[serde(rename = "Estado", default)]
    pub status: Option<String>,
    #[serde(rename = "Comentarios", default)]
    pub comments: Option<String>,
    #[serde(rename = "Imágenes", default)]
    pub images: Option<String>,
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Outcome of reading one data line
pub type RowRecord = Result<RawInventoryRow, csv::Error>;

/// Parse a whole CSV document.
///
/// The first line is the header. Header labels are trimmed, a leading UTF-8
/// BOM is ignored and rows may be shorter or longer than the header.
///
/// Only a header that cannot be read fails the document. Data cells that are
/// not valid UTF-8 (typically Latin-1 spreadsheet exports) are decoded
/// lossily, and any other problem with a line is returned in that line's
/// slot so the caller can report it against the row.
pub fn read_rows(data: &[u8]) -> Result<Vec<RowRecord>, csv::Error> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(data);

    let headers = reader.headers()?.clone();

    Ok(reader
        .byte_records()
        .map(|record| -> RowRecord {
            let record = record?;
            let decoded: csv::StringRecord = record
                .iter()
                .map(String::from_utf8_lossy)
                .collect();
            decoded.deserialize(Some(&headers))
        })
        .collect())
}
