use crate::amount::Amount;
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};

/// Default page size for enumeration queries
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Hard cap on the page size a caller may request
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Fixed constants of a ledger instance.
///
/// `unit` is the number of sub-units that make up one whole unit; crossing a
/// multiple of it mints or burns one item. It is set once at construction and
/// must be non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Sub-units per whole unit
    pub unit: Amount,

    /// Optional cap on the number of live items
    pub max_items: Option<u64>,

    /// Page size used when a query does not ask for one
    pub default_page_limit: u32,

    /// Largest page size a query may ask for
    pub max_page_limit: u32,
}

impl LedgerConfig {
    /// Create a configuration with the given unit size and default paging
    pub fn new(unit: Amount) -> Result<Self, LedgerError> {
        if unit.is_zero() {
            return Err(LedgerError::InvalidConfig {
                reason: "unit must be non-zero".to_string(),
            });
        }
        Ok(Self {
            unit,
            max_items: None,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: MAX_PAGE_LIMIT,
        })
    }

    /// Create a configuration where one whole unit is `10^decimals` sub-units
    pub fn with_decimals(decimals: u32) -> Result<Self, LedgerError> {
        let unit = 10u128
            .checked_pow(decimals)
            .ok_or_else(|| LedgerError::InvalidConfig {
                reason: format!("10^{} overflows the amount range", decimals),
            })?;
        Self::new(Amount::new(unit))
    }

    /// Set a cap on the number of live items
    pub fn with_max_items(mut self, max: u64) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Clamp a requested page size to the configured limits
    pub fn clamp_limit(&self, limit: Option<u32>) -> usize {
        limit
            .unwrap_or(self.default_page_limit)
            .min(self.max_page_limit) as usize
    }
}
