//! Product catalog repository (read-only)

use std::fmt;

use rusqlite::Row;
use serde::Serialize;

use super::DbPool;
use crate::{Error, Result};

/// Upper bound (exclusive) of the low budget tier
pub const LOW_CEILING: f64 = 500.0;

/// Upper bound (inclusive) of the medium budget tier
pub const PREMIUM_FLOOR: f64 = 1500.0;

/// A product row from the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub brand: String,
    pub shade: Option<String>,
    pub category: String,
    pub price: f64,
    pub stock: i64,
}

impl Product {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            brand: row.get(2)?,
            shade: row.get(3)?,
            category: row.get(4)?,
            price: row.get(5)?,
            stock: row.get(6)?,
        })
    }

    /// Price as spoken or displayed: no decimals when integral
    #[must_use]
    pub fn price_label(&self) -> String {
        format_price(self.price)
    }
}

/// Format a price without trailing `.00` for whole amounts
#[must_use]
pub fn format_price(price: f64) -> String {
    if price.fract() == 0.0 && price.abs() < 1e15 {
        format!("{price:.0}")
    } else {
        format!("{price:.2}")
    }
}

/// Price bucket used to filter the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    /// price < 500
    Low,
    /// 500 <= price <= 1500
    Medium,
    /// price > 1500
    Premium,
}

impl BudgetTier {
    /// Parse free text such as a caller utterance ("Medium.") into a tier
    ///
    /// Returns `None` for anything that is not one of the three tier names,
    /// which callers treat as "no price filter".
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let cleaned = text
            .trim()
            .trim_end_matches(['.', '!', '?', ','])
            .trim()
            .to_lowercase();

        match cleaned.as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }

    /// Lowercase name of the tier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::Premium => "premium",
        }
    }

    /// Whether a price falls inside this tier
    #[must_use]
    pub fn contains(self, price: f64) -> bool {
        match self {
            Self::Low => price < LOW_CEILING,
            Self::Medium => (LOW_CEILING..=PREMIUM_FLOOR).contains(&price),
            Self::Premium => price > PREMIUM_FLOOR,
        }
    }

    const fn sql_clause(self) -> &'static str {
        match self {
            Self::Low => " AND price < 500",
            Self::Medium => " AND price BETWEEN 500 AND 1500",
            Self::Premium => " AND price > 1500",
        }
    }
}

impl fmt::Display for BudgetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product repository
#[derive(Clone)]
pub struct ProductRepo {
    pool: DbPool,
}

impl ProductRepo {
    /// Create a new product repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch in-stock products, optionally filtered by category and budget tier
    ///
    /// Category matching is exact but case-insensitive; an empty category is
    /// treated as unset. Rows come back in database order.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn fetch(&self, category: Option<&str>, budget: Option<BudgetTier>) -> Result<Vec<Product>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut query = String::from(
            "SELECT id, name, brand, shade, category, price, stock
             FROM products WHERE stock > 0",
        );
        let mut params: Vec<&str> = Vec::new();

        if let Some(category) = category.filter(|c| !c.trim().is_empty()) {
            query.push_str(" AND category = ?1 COLLATE NOCASE");
            params.push(category);
        }
        if let Some(tier) = budget {
            query.push_str(tier.sql_clause());
        }

        let mut stmt = conn.prepare(&query)?;
        let products = stmt
            .query_map(rusqlite::params_from_iter(params), Product::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(
            category = ?category,
            budget = ?budget,
            count = products.len(),
            "fetched products"
        );

        Ok(products)
    }

    /// Fetch with a free-text budget; unrecognized text applies no price filter
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn fetch_by_text(&self, category: Option<&str>, budget: Option<&str>) -> Result<Vec<Product>> {
        self.fetch(category, budget.and_then(BudgetTier::parse))
    }

    /// Fetch the whole in-stock catalog
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn fetch_all(&self) -> Result<Vec<Product>> {
        self.fetch(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> ProductRepo {
        let pool = init_memory().unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            r"
            INSERT INTO products (name, brand, shade, category, price, stock) VALUES
                ('Matte Red', 'Lakme', 'Crimson', 'lipstick', 450, 10),
                ('Velvet Nude', 'Maybelline', 'Nude', 'lipstick', 500, 3),
                ('Ruby Gloss', 'Lakme', 'Ruby', 'lipstick', 1500, 1),
                ('Luxe Rouge', 'Dior', 'Rouge 999', 'lipstick', 3200, 2),
                ('Sold Out Pink', 'Nykaa', 'Pink', 'lipstick', 300, 0),
                ('Day Cream', 'Olay', NULL, 'Cream', 899.5, 7);
            ",
        )
        .unwrap();
        drop(conn);
        ProductRepo::new(pool)
    }

    fn names(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_fetch_all_skips_out_of_stock() {
        let repo = setup();
        let all = repo.fetch_all().unwrap();

        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|p| p.stock > 0));
        assert!(!names(&all).contains(&"Sold Out Pink"));
    }

    #[test]
    fn test_fetch_low_tier() {
        let repo = setup();
        let low = repo.fetch(None, Some(BudgetTier::Low)).unwrap();
        assert_eq!(names(&low), vec!["Matte Red"]);
    }

    #[test]
    fn test_fetch_medium_tier_is_inclusive() {
        let repo = setup();
        let medium = repo.fetch(Some("lipstick"), Some(BudgetTier::Medium)).unwrap();
        assert_eq!(names(&medium), vec!["Velvet Nude", "Ruby Gloss"]);
    }

    #[test]
    fn test_fetch_premium_tier() {
        let repo = setup();
        let premium = repo.fetch(None, Some(BudgetTier::Premium)).unwrap();
        assert_eq!(names(&premium), vec!["Luxe Rouge"]);
    }

    #[test]
    fn test_category_match_ignores_case() {
        let repo = setup();
        let creams = repo.fetch(Some("cream"), None).unwrap();
        assert_eq!(names(&creams), vec!["Day Cream"]);
        assert_eq!(creams[0].shade, None);
    }

    #[test]
    fn test_unrecognized_budget_text_applies_no_filter() {
        let repo = setup();
        let products = repo.fetch_by_text(Some("lipstick"), Some("cheap please")).unwrap();
        assert_eq!(products.len(), 4);
    }

    #[test]
    fn test_empty_category_is_unset() {
        let repo = setup();
        assert_eq!(repo.fetch(Some("  "), None).unwrap().len(), 5);
    }

    #[test]
    fn test_budget_tier_parse() {
        assert_eq!(BudgetTier::parse("Medium."), Some(BudgetTier::Medium));
        assert_eq!(BudgetTier::parse("  LOW "), Some(BudgetTier::Low));
        assert_eq!(BudgetTier::parse("premium!"), Some(BudgetTier::Premium));
        assert_eq!(BudgetTier::parse("mid"), None);
        assert_eq!(BudgetTier::parse(""), None);
    }

    #[test]
    fn test_budget_tier_bounds() {
        assert!(BudgetTier::Low.contains(499.99));
        assert!(!BudgetTier::Low.contains(500.0));
        assert!(BudgetTier::Medium.contains(500.0));
        assert!(BudgetTier::Medium.contains(1500.0));
        assert!(!BudgetTier::Premium.contains(1500.0));
        assert!(BudgetTier::Premium.contains(1500.01));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(450.0), "450");
        assert_eq!(format_price(899.5), "899.50");
    }
}
