//! # API Data Types
//!
//! Data transfer objects exchanged with the remote POS API.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         API Types                                       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Producto     │   │      Venta      │   │ DashboardResumen│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  ventas         │       │
//! │  │  sku (barcode)  │   │  total          │   │  inventario     │       │
//! │  │  precio_venta   │   │  metodo_pago    │   │  alertas        │       │
//! │  │  stock_actual   │   │  cantidad_items │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CheckoutRequest │   │    MetodoPago   │   │  User / Tienda  │       │
//! │  │  items          │   │  EFECTIVO       │   │  auth session   │       │
//! │  │  metodo_pago    │   │  MERCADOPAGO    │   │  rubro          │       │
//! │  └─────────────────┘   │  TARJETA        │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names follow the API's JSON exactly, so these types
//! (de)serialize without renames. Amounts are whatever the API sends
//! (decimal numbers); this client never does money arithmetic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// Products
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Producto {
    pub id: String,
    pub nombre: String,
    pub sku: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    pub precio_venta: f64,
    #[serde(default)]
    pub precio_costo: f64,
    pub stock_actual: f64,
    #[serde(default)]
    pub tipo: String,
    /// Free-form attributes (size, color, weight...).
    #[serde(default)]
    #[ts(type = "Record<string, unknown> | null")]
    pub atributos: Option<Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub tienda_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Body for creating or updating a product. Absent fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductoInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precio_venta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precio_costo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_actual: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "Record<string, unknown> | null")]
    pub atributos: Option<Value>,
}

/// Fast lookup result for a scanned code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductoScan {
    pub id: String,
    pub nombre: String,
    pub sku: String,
    pub precio_venta: f64,
    pub stock_actual: f64,
    #[serde(default)]
    pub tipo: String,
    pub tiene_stock: bool,
}

// =============================================================================
// Sales
// =============================================================================

/// Payment methods accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum MetodoPago {
    Efectivo,
    Mercadopago,
    Tarjeta,
}

impl std::fmt::Display for MetodoPago {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetodoPago::Efectivo => write!(f, "EFECTIVO"),
            MetodoPago::Mercadopago => write!(f, "MERCADOPAGO"),
            MetodoPago::Tarjeta => write!(f, "TARJETA"),
        }
    }
}

impl std::str::FromStr for MetodoPago {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EFECTIVO" | "CASH" => Ok(MetodoPago::Efectivo),
            "MERCADOPAGO" => Ok(MetodoPago::Mercadopago),
            "TARJETA" | "CARD" => Ok(MetodoPago::Tarjeta),
            _ => Err(CoreError::UnknownPaymentMethod(s.to_string())),
        }
    }
}

/// One line of a checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemVenta {
    pub producto_id: String,
    pub cantidad: i64,
    /// Overrides the catalog price when set (weighed goods, discounts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precio_unitario: Option<f64>,
}

/// Checkout mutation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub items: Vec<ItemVenta>,
    pub metodo_pago: MetodoPago,
}

/// Lifecycle of a recorded sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum EstadoVenta {
    Completada,
    Cancelada,
}

/// A recorded sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Venta {
    pub id: String,
    #[serde(default)]
    pub fecha: String,
    pub total: f64,
    pub metodo_pago: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub cantidad_items: i64,
    #[serde(default)]
    pub items: Option<Vec<ItemVenta>>,
    #[serde(default)]
    pub estado: Option<EstadoVenta>,
}

// =============================================================================
// Dashboard
// =============================================================================

/// Daily sales total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VentaDia {
    pub fecha: String,
    pub total: f64,
}

/// Sales figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MetricaVentas {
    pub hoy: f64,
    pub ayer: f64,
    pub semana: f64,
    pub mes: f64,
    pub tickets_emitidos: i64,
    pub cambio_diario_porcentaje: f64,
    pub cambio_semanal_porcentaje: f64,
    #[serde(default)]
    pub ultimos_7_dias: Vec<VentaDia>,
}

/// Inventory figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MetricaInventario {
    pub total_productos: i64,
    pub productos_activos: i64,
    pub productos_bajo_stock: i64,
    pub valor_total_inventario: f64,
}

/// Best-selling product of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductoDestacado {
    pub id: String,
    pub nombre: String,
    pub sku: String,
    pub stock: f64,
    pub ventas_hoy: i64,
}

/// Consolidated dashboard summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardResumen {
    pub ventas: MetricaVentas,
    pub inventario: MetricaInventario,
    #[serde(default)]
    pub productos_destacados: Vec<ProductoDestacado>,
    pub alertas_criticas: i64,
    pub ultima_actualizacion: String,
}

/// Urgency of an inventory or sales insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum NivelUrgencia {
    Baja,
    Media,
    Alta,
    Critica,
}

/// An alert or recommendation (low stock, slow mover...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Insight {
    pub id: String,
    pub tipo: String,
    pub mensaje: String,
    pub nivel_urgencia: NivelUrgencia,
    pub is_active: bool,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub extra_data: Value,
    pub created_at: String,
}

// =============================================================================
// Auth & Stores
// =============================================================================

/// Login form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// A store (tenant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tienda {
    pub id: String,
    pub nombre: String,
    #[serde(default)]
    pub rubro: String,
    #[serde(default)]
    pub direccion: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl Tienda {
    /// Business category derived from the free-text `rubro`.
    pub fn rubro_kind(&self) -> Option<RubroKind> {
        RubroKind::from_rubro(&self.rubro)
    }
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub rol: String,
    #[serde(default)]
    pub tienda: Option<Tienda>,
    #[serde(default)]
    pub tienda_id: String,
}

impl User {
    /// A user whose store has no `rubro` still has to go through onboarding.
    pub fn needs_onboarding(&self) -> bool {
        self.tienda
            .as_ref()
            .map_or(true, |t| t.rubro.trim().is_empty())
    }
}

/// Login response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub user: User,
}

/// How the catalog views lay out products for a store's line of business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RubroKind {
    /// Clothing: size/color variants.
    Ropa,
    /// Sold by weight: butcher, greengrocer, bulk.
    Pesable,
    /// Everything else.
    General,
}

impl RubroKind {
    /// Classifies a free-text line of business. Empty input yields `None`.
    pub fn from_rubro(rubro: &str) -> Option<Self> {
        let rubro = rubro.trim().to_lowercase();
        if rubro.is_empty() {
            return None;
        }

        const ROPA: [&str; 4] = ["ropa", "indumentaria", "textil", "moda"];
        const PESABLE: [&str; 5] = ["carnic", "verdu", "frut", "pesable", "granel"];

        if ROPA.iter().any(|k| rubro.contains(k)) {
            Some(RubroKind::Ropa)
        } else if PESABLE.iter().any(|k| rubro.contains(k)) {
            Some(RubroKind::Pesable)
        } else {
            Some(RubroKind::General)
        }
    }
}

// =============================================================================
// Admin
// =============================================================================

/// A user as listed by the admin panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Usuario {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub rol: String,
    pub tienda_id: String,
    pub is_active: bool,
}

/// New store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TiendaCreate {
    pub nombre: String,
    pub rubro: String,
}

/// Partial update of the signed-in user's store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TiendaUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rubro: Option<String>,
}

/// New user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UsuarioCreate {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub rol: String,
    pub tienda_id: String,
}

/// Store and first user created in one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OnboardingData {
    pub nombre_tienda: String,
    pub rubro: String,
    pub email: String,
    pub password: String,
    pub nombre_completo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rol: Option<String>,
}

/// Onboarding result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OnboardingResponse {
    pub tienda: Tienda,
    pub usuario: Usuario,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metodo_pago_wire_format() {
        let json = serde_json::to_string(&MetodoPago::Efectivo).unwrap();
        assert_eq!(json, "\"EFECTIVO\"");
        assert_eq!("tarjeta".parse::<MetodoPago>().unwrap(), MetodoPago::Tarjeta);
        assert!("BITCOIN".parse::<MetodoPago>().is_err());
    }

    #[test]
    fn test_checkout_request_shape() {
        let request = CheckoutRequest {
            items: vec![ItemVenta {
                producto_id: "550e8400-e29b-41d4-a716-446655440000".into(),
                cantidad: 2,
                precio_unitario: None,
            }],
            metodo_pago: MetodoPago::Efectivo,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["metodo_pago"], "EFECTIVO");
        assert_eq!(value["items"][0]["cantidad"], 2);
        assert!(value["items"][0].get("precio_unitario").is_none());
    }

    #[test]
    fn test_producto_tolerates_missing_optionals() {
        let json = r#"{"id":"p1","nombre":"Yerba","sku":"779123","precio_venta":1500.5,"stock_actual":12}"#;
        let producto: Producto = serde_json::from_str(json).unwrap();
        assert!(producto.is_active);
        assert_eq!(producto.descripcion, None);
        assert_eq!(producto.stock_actual, 12.0);
    }

    #[test]
    fn test_rubro_kind() {
        assert_eq!(RubroKind::from_rubro("Indumentaria femenina"), Some(RubroKind::Ropa));
        assert_eq!(RubroKind::from_rubro("Carnicería"), Some(RubroKind::Pesable));
        assert_eq!(RubroKind::from_rubro("Verdulería"), Some(RubroKind::Pesable));
        assert_eq!(RubroKind::from_rubro("Kiosco"), Some(RubroKind::General));
        assert_eq!(RubroKind::from_rubro("  "), None);
    }

    #[test]
    fn test_needs_onboarding() {
        let mut user = User {
            id: "u1".into(),
            email: "a@b.c".into(),
            full_name: "Ana".into(),
            rol: "admin".into(),
            tienda: None,
            tienda_id: "t1".into(),
        };
        assert!(user.needs_onboarding());

        user.tienda = Some(Tienda {
            id: "t1".into(),
            nombre: "Almacén".into(),
            rubro: "general".into(),
            direccion: None,
            telefono: None,
            email: None,
            is_active: None,
        });
        assert!(!user.needs_onboarding());
    }
}
