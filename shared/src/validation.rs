//! Validation utilities for the Site Kardex ledger

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::types::whole_units;

// ============================================================================
// Line Validations
// ============================================================================

/// Validate that a movement line moves a positive quantity
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a unit cost entered on a draft line
pub fn validate_unit_cost(unit_cost: Decimal) -> Result<(), &'static str> {
    if unit_cost < Decimal::ZERO {
        return Err("Unit cost cannot be negative");
    }
    Ok(())
}

/// Validate the supplier guide / invoice reference of a movement
pub fn validate_reference_document(reference: &str) -> Result<(), &'static str> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err("Reference document is required");
    }
    if trimmed.len() > 50 {
        return Err("Reference document must be at most 50 characters");
    }
    Ok(())
}

// ============================================================================
// Serial Validations
// ============================================================================

/// Split a serial list, trimming whitespace and dropping empty entries
pub fn parse_serials(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check that a fixed-asset line declares exactly one serial per unit
pub fn validate_serial_count(serials: &[String], quantity: Decimal) -> Result<(), &'static str> {
    match whole_units(quantity) {
        Some(units) if units == serials.len() => Ok(()),
        Some(_) => Err("Serial count must match the quantity"),
        None => Err("Fixed assets must be received in whole units"),
    }
}

/// First serial that appears more than once, if any
pub fn first_duplicate(serials: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    serials
        .iter()
        .find(|s| !seen.insert(s.as_str()))
        .map(String::as_str)
}
