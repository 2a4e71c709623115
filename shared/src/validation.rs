//! Validation utilities for the Pharmacy Retail ERP
//!
//! Includes pharmacy-retail validations shared by the backend and tooling.

use chrono::NaiveDate;
use rust_decimal::Decimal;

// ============================================================================
// Inventory Validations
// ============================================================================

/// Validate that a document line quantity is strictly positive
pub fn validate_quantity_positive(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a unit cost (must not be negative)
pub fn validate_unit_cost(cost: Decimal) -> Result<(), &'static str> {
    if cost < Decimal::ZERO {
        return Err("Unit cost cannot be negative");
    }
    Ok(())
}

/// Validate a margin percentage (0-500 covers retail pharmacy pricing)
pub fn validate_margin_percent(margin: Decimal) -> Result<(), &'static str> {
    if margin < Decimal::ZERO || margin > Decimal::from(500) {
        return Err("Margin must be between 0 and 500 percent");
    }
    Ok(())
}

/// Validate a VAT rate percentage
pub fn validate_vat_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO || rate > Decimal::from(100) {
        return Err("VAT rate must be between 0 and 100 percent");
    }
    Ok(())
}

/// Validate pack size (units per retail pack)
pub fn validate_pack_size(pack_size: i32) -> Result<(), &'static str> {
    if pack_size < 1 {
        return Err("Pack size must be at least 1");
    }
    Ok(())
}

/// Validate that received stock is not already expired
pub fn validate_expiry_on_receipt(
    expiry: NaiveDate,
    receipt_date: NaiveDate,
) -> Result<(), &'static str> {
    if expiry <= receipt_date {
        return Err("Cannot receive stock that is already expired");
    }
    Ok(())
}

// ============================================================================
// Item Master Validations
// ============================================================================

/// Validate an SKU: non-empty, at most 32 chars, uppercase alphanumeric with
/// dashes (e.g. "PCM-500-TAB")
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.is_empty() || sku.len() > 32 {
        return Err("SKU must be 1-32 characters");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("SKU may contain only A-Z, 0-9 and dashes");
    }
    Ok(())
}

/// Validate an EAN-13 barcode including its check digit
pub fn validate_ean13(barcode: &str) -> Result<(), &'static str> {
    if barcode.len() != 13 || !barcode.chars().all(|c| c.is_ascii_digit()) {
        return Err("Barcode must be 13 digits");
    }
    let digits: Vec<u32> = barcode.chars().filter_map(|c| c.to_digit(10)).collect();
    let checksum: u32 = digits[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    let check_digit = (10 - (checksum % 10)) % 10;
    if check_digit != digits[12] {
        return Err("Invalid barcode check digit");
    }
    Ok(())
}

/// Validate a branch code: 2-8 uppercase alphanumeric characters
pub fn validate_branch_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 2 || code.len() > 8 {
        return Err("Branch code must be 2-8 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err("Branch code may contain only A-Z and 0-9");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_validate_quantity_positive() {
        assert!(validate_quantity_positive(dec("1")).is_ok());
        assert!(validate_quantity_positive(dec("0.5")).is_ok());
        assert!(validate_quantity_positive(Decimal::ZERO).is_err());
        assert!(validate_quantity_positive(dec("-3")).is_err());
    }

    #[test]
    fn test_validate_unit_cost() {
        assert!(validate_unit_cost(Decimal::ZERO).is_ok());
        assert!(validate_unit_cost(dec("12.50")).is_ok());
        assert!(validate_unit_cost(dec("-0.01")).is_err());
    }

    #[test]
    fn test_validate_margin_percent() {
        assert!(validate_margin_percent(Decimal::ZERO).is_ok());
        assert!(validate_margin_percent(dec("35")).is_ok());
        assert!(validate_margin_percent(dec("500")).is_ok());
        assert!(validate_margin_percent(dec("500.01")).is_err());
        assert!(validate_margin_percent(dec("-5")).is_err());
    }

    #[test]
    fn test_validate_vat_rate() {
        assert!(validate_vat_rate(dec("7")).is_ok());
        assert!(validate_vat_rate(dec("101")).is_err());
    }

    #[test]
    fn test_validate_pack_size() {
        assert!(validate_pack_size(1).is_ok());
        assert!(validate_pack_size(100).is_ok());
        assert!(validate_pack_size(0).is_err());
        assert!(validate_pack_size(-10).is_err());
    }

    #[test]
    fn test_validate_expiry_on_receipt() {
        let receipt = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let future = NaiveDate::from_ymd_opt(2027, 6, 30).unwrap();
        let past = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert!(validate_expiry_on_receipt(future, receipt).is_ok());
        assert!(validate_expiry_on_receipt(past, receipt).is_err());
        // Same-day expiry is rejected as well
        assert!(validate_expiry_on_receipt(receipt, receipt).is_err());
    }

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("PCM-500-TAB").is_ok());
        assert!(validate_sku("AMOX250").is_ok());
        assert!(validate_sku("").is_err());
        assert!(validate_sku("lowercase").is_err());
        assert!(validate_sku("HAS SPACE").is_err());
    }

    #[test]
    fn test_validate_ean13_valid() {
        // Real-world EAN-13 codes with correct check digits
        assert!(validate_ean13("4006381333931").is_ok());
        assert!(validate_ean13("8850999320014").is_ok());
    }

    #[test]
    fn test_validate_ean13_invalid() {
        assert!(validate_ean13("4006381333932").is_err()); // wrong check digit
        assert!(validate_ean13("12345").is_err()); // too short
        assert!(validate_ean13("40063813339AB").is_err()); // non-digit
    }

    #[test]
    fn test_validate_branch_code() {
        assert!(validate_branch_code("MAIN").is_ok());
        assert!(validate_branch_code("BR02").is_ok());
        assert!(validate_branch_code("X").is_err());
        assert!(validate_branch_code("toolongcode").is_err());
        assert!(validate_branch_code("br02").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("owner@pharmacy.co").is_ok());
        assert!(validate_email("bad").is_err());
    }
}
