//! # Validation Module
//!
//! Checks run on mutation input before any request leaves the client.
//!
//! ## Where Validation Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: View forms                                                   │
//! │  └── Immediate feedback while typing                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Mutation descriptor (nexus-sync)                             │
//! │  └── THIS MODULE: rejected input never reaches the network             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Remote API                                                   │
//! │  └── Authoritative checks (stock, permissions, uniqueness)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use nexus_core::validation::{validate_barcode, validate_quantity};
//!
//! validate_barcode("7790001234567").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::{CoreError, CoreResult, ValidationError, ValidationResult};
use crate::types::{CheckoutRequest, ProductoInput};
use crate::{MAX_CHECKOUT_ITEMS, MAX_ITEM_QUANTITY};

/// Longest code accepted for a scan lookup.
pub const MAX_BARCODE_LENGTH: usize = 64;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a scanned or typed product code before lookup.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - ASCII letters and digits only (what the scanner decoder emits)
///
/// ## Example
/// ```rust
/// use nexus_core::validation::validate_barcode;
///
/// assert!(validate_barcode("7790001234567").is_ok());
/// assert!(validate_barcode("").is_err());
/// assert!(validate_barcode("77/90").is_err());
/// ```
pub fn validate_barcode(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "codigo".to_string(),
        });
    }

    if code.len() > MAX_BARCODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "codigo".to_string(),
            max: MAX_BARCODE_LENGTH,
        });
    }

    // Path segment for the scan endpoint, so no separators allowed
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "codigo".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name: non-empty, at most 200 characters.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "nombre".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "nombre".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Loose email check. The API does the real validation.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like user@domain".to_string(),
        }),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line-item quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "cantidad".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "cantidad".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price. Zero is allowed, NaN and negatives are not.
pub fn validate_price(field: &str, price: f64) -> ValidationResult<()> {
    if !price.is_finite() {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a number".to_string(),
        });
    }

    if price < 0.0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates that `id` parses as a UUID.
///
/// ```rust
/// use nexus_core::validation::validate_uuid;
///
/// assert!(validate_uuid("producto_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("producto_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id.trim()).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Mutation Input Validators
// =============================================================================

/// Validates a checkout before it is posted.
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  checkout(items, metodo_pago)                                          │
/// │       │                                                                 │
/// │       ├── no items?        → CoreError::EmptyCheckout                  │
/// │       ├── > 100 items?     → CoreError::CheckoutTooLarge               │
/// │       ├── bad producto_id? → CoreError::Validation(InvalidFormat)      │
/// │       ├── qty ∉ 1..=999?   → CoreError::Validation(...)                │
/// │       │                                                                 │
/// │       └── OK → POST /api/v1/ventas/checkout                            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_checkout(request: &CheckoutRequest) -> CoreResult<()> {
    if request.items.is_empty() {
        return Err(CoreError::EmptyCheckout);
    }

    if request.items.len() > MAX_CHECKOUT_ITEMS {
        return Err(CoreError::CheckoutTooLarge {
            max: MAX_CHECKOUT_ITEMS,
        });
    }

    for item in &request.items {
        validate_uuid("producto_id", &item.producto_id)?;
        validate_quantity(item.cantidad)?;
        if let Some(precio) = item.precio_unitario {
            validate_price("precio_unitario", precio)?;
        }
    }

    Ok(())
}

/// Validates a product body. With `creating`, name, SKU and sale price are
/// required; otherwise only the fields present are checked.
pub fn validate_producto_input(input: &ProductoInput, creating: bool) -> ValidationResult<()> {
    match (&input.nombre, creating) {
        (Some(nombre), _) => validate_product_name(nombre)?,
        (None, true) => {
            return Err(ValidationError::Required {
                field: "nombre".to_string(),
            })
        }
        (None, false) => {}
    }

    match (&input.sku, creating) {
        (Some(sku), _) => validate_sku(sku)?,
        (None, true) => {
            return Err(ValidationError::Required {
                field: "sku".to_string(),
            })
        }
        (None, false) => {}
    }

    match (input.precio_venta, creating) {
        (Some(precio), _) => validate_price("precio_venta", precio)?,
        (None, true) => {
            return Err(ValidationError::Required {
                field: "precio_venta".to_string(),
            })
        }
        (None, false) => {}
    }

    if let Some(costo) = input.precio_costo {
        validate_price("precio_costo", costo)?;
    }

    if let Some(stock) = input.stock_actual {
        if !stock.is_finite() || stock < 0.0 {
            return Err(ValidationError::OutOfRange {
                field: "stock_actual".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
