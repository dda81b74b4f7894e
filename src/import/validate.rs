//! Row validation
//!
//! Checks a normalized row and reports every problem as a Spanish,
//! row-indexed message (`Fila N: ...`). All checks run; nothing
//! short-circuits.

use super::normalize::{parse_normalized_date, InventoryRow, YearValue};
use super::row::headers;
use crate::models::InventoryStatus;
use chrono::NaiveDate;

/// A row that passed validation, with every required value typed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRow {
    pub model: String,
    pub year: i32,
    pub brand: String,
    pub inventory_type: String,
    pub serial_number: String,
    pub reception_date: NaiveDate,
    pub status: InventoryStatus,
    pub comments: Option<String>,
    pub images: Vec<String>,
    pub user_id: i64,
}

/// Validate `row`, the `position`-th data line (1-based) of the file.
///
/// `user_id` is the acting user taken from the request. On failure every
/// violation is returned, one message each.
pub fn validate_row(
    row: &InventoryRow,
    user_id: Option<i64>,
    position: usize,
) -> Result<ValidatedRow, Vec<String>> {
    let mut errors = Vec::new();

    let model = required(&mut errors, position, headers::MODEL, row.model.as_deref());
    let year = match row.year {
        YearValue::Year(year) => Some(year),
        YearValue::Unset | YearValue::Invalid => {
            errors.push(missing_field(position, headers::YEAR));
            None
        }
    };
    let brand = required(&mut errors, position, headers::BRAND, row.brand.as_deref());
    let inventory_type = required(
        &mut errors,
        position,
        headers::TYPE,
        row.inventory_type.as_deref(),
    );
    let serial_number = required(
        &mut errors,
        position,
        headers::SERIAL_NUMBER,
        row.serial_number.as_deref(),
    );
    let reception_date = required(
        &mut errors,
        position,
        headers::RECEPTION_DATE,
        row.reception_date.as_deref(),
    );
    let status = required(&mut errors, position, headers::STATUS, row.status.as_deref());

    let status = status.and_then(|s| match s.parse::<InventoryStatus>() {
        Ok(status) => Some(status),
        Err(_) => {
            errors.push(invalid_status(position));
            None
        }
    });

    let reception_date = reception_date.and_then(|d| match parse_normalized_date(d) {
        Some(date) => Some(date),
        None => {
            errors.push(invalid_date(position));
            None
        }
    });

    if user_id.is_none() {
        errors.push(invalid_user(position));
    }

    match (
        model,
        year,
        brand,
        inventory_type,
        serial_number,
        reception_date,
        status,
        user_id,
    ) {
        (
            Some(model),
            Some(year),
            Some(brand),
            Some(inventory_type),
            Some(serial_number),
            Some(reception_date),
            Some(status),
            Some(user_id),
        ) if errors.is_empty() => Ok(ValidatedRow {
            model: model.to_string(),
            year,
            brand: brand.to_string(),
            inventory_type: inventory_type.to_string(),
            serial_number: serial_number.to_string(),
            reception_date,
            status,
            comments: row.comments.clone(),
            images: row.images.clone(),
            user_id,
        }),
        _ => Err(errors),
    }
}

fn required<'a>(
    errors: &mut Vec<String>,
    position: usize,
    label: &str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Some(v),
        None => {
            errors.push(missing_field(position, label));
            None
        }
    }
}

pub fn missing_field(position: usize, label: &str) -> String {
    format!("Fila {}: El campo '{}' es obligatorio", position, label)
}

pub fn invalid_status(position: usize) -> String {
    format!(
        "Fila {}: El campo '{}' debe ser uno de 'ALTA', 'BAJA' o 'PROPUESTA'",
        position,
        headers::STATUS
    )
}

pub fn invalid_date(position: usize) -> String {
    format!(
        "Fila {}: El campo '{}' debe ser una fecha válida",
        position,
        headers::RECEPTION_DATE
    )
}

pub fn invalid_user(position: usize) -> String {
    format!(
        "Fila {}: El usuario no es válido, por favor inicie sesión nuevamente",
        position
    )
}
