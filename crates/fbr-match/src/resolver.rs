use fbr_schemas::{InventoryRecord, RecipeIngredient, ResolvedIngredient};
use serde::{Deserialize, Serialize};

use crate::matcher::{Matcher, TokenContainmentMatcher};

/// Minimum combined score for a binding to be accepted.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Brand similarity contributes at most this much on top of the name score.
pub const DEFAULT_BRAND_WEIGHT: f64 = 0.3;

/// Binds recipe ingredients to inventory records with a pluggable [`Matcher`].
#[derive(Debug, Clone)]
pub struct Resolver<M: Matcher = TokenContainmentMatcher> {
    matcher: M,
    threshold: f64,
    brand_weight: f64,
}

impl Default for Resolver<TokenContainmentMatcher> {
    fn default() -> Self {
        Self::new(TokenContainmentMatcher)
    }
}

impl<M: Matcher> Resolver<M> {
    pub fn new(matcher: M) -> Self {
        Self {
            matcher,
            threshold: DEFAULT_THRESHOLD,
            brand_weight: DEFAULT_BRAND_WEIGHT,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_brand_weight(mut self, brand_weight: f64) -> Self {
        self.brand_weight = brand_weight;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Combined score of one candidate: name score plus weighted brand score.
    pub fn candidate_score(&self, ingredient: &RecipeIngredient, item: &InventoryRecord) -> f64 {
        let name_score = self.matcher.score(&ingredient.product_name, &item.product_name);
        let brand_score = match item.brand.as_deref() {
            Some(brand) if !brand.trim().is_empty() => {
                self.matcher.score(&ingredient.product_name, brand) * self.brand_weight
            }
            _ => 0.0,
        };
        name_score + brand_score
    }

    /// Best candidate for one ingredient, if any clears the threshold.
    ///
    /// Ties go to the earliest record in `inventory` (strictly-greater wins).
    pub fn resolve_one(
        &self,
        ingredient: &RecipeIngredient,
        inventory: &[InventoryRecord],
    ) -> ResolvedIngredient {
        let mut best: Option<(&InventoryRecord, f64)> = None;
        for item in inventory {
            let score = self.candidate_score(ingredient, item);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((item, score)),
            }
        }

        match best {
            Some((item, score)) if score >= self.threshold => ResolvedIngredient {
                ingredient: ingredient.clone(),
                inventory_item_id: Some(item.id.clone()),
                barcode: item.barcode.clone(),
                match_score: Some(score),
            },
            _ => ResolvedIngredient::unresolved(ingredient.clone()),
        }
    }

    /// Resolve every ingredient against one inventory snapshot.
    ///
    /// Side-effect free and idempotent: safe to re-run against fresher
    /// snapshots before a session starts.
    pub fn resolve_all(
        &self,
        ingredients: &[RecipeIngredient],
        inventory: &[InventoryRecord],
    ) -> Vec<ResolvedIngredient> {
        ingredients
            .iter()
            .map(|ing| self.resolve_one(ing, inventory))
            .collect()
    }
}

/// Resolve with the default matcher, brand weight and the given threshold.
pub fn resolve_all(
    ingredients: &[RecipeIngredient],
    inventory: &[InventoryRecord],
    threshold: Option<f64>,
) -> Vec<ResolvedIngredient> {
    Resolver::default()
        .with_threshold(threshold.unwrap_or(DEFAULT_THRESHOLD))
        .resolve_all(ingredients, inventory)
}

/// Stock that is not reserved for something else. Never negative.
pub fn available_quantity(item: &InventoryRecord) -> i64 {
    (item.quantity - item.reserved_quantity).max(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub is_valid: bool,
    pub available: i64,
    pub needed: f64,
}

/// Compare one ingredient's full-batch need against an item's free stock.
pub fn check_availability(ingredient: &RecipeIngredient, item: &InventoryRecord) -> Availability {
    let available = available_quantity(item);
    let needed = ingredient.estimated_quantity;
    Availability {
        is_valid: available as f64 >= needed,
        available,
        needed,
    }
}

/// Operator-facing shortage warning. Never blocks a session from starting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWarning {
    pub product_name: String,
    pub inventory_item_id: String,
    pub available: i64,
    pub needed: f64,
}

/// Check every bound ingredient against a snapshot; returns only shortages.
///
/// Bound ingredients whose record is absent from the snapshot are reported
/// with `available = 0`.
pub fn availability_report(
    resolved: &[ResolvedIngredient],
    inventory: &[InventoryRecord],
) -> Vec<AvailabilityWarning> {
    let mut out = Vec::new();
    for r in resolved {
        let Some(item_id) = r.inventory_item_id.as_deref() else {
            continue;
        };
        let (available, ok) = match inventory.iter().find(|i| i.id == item_id) {
            Some(item) => {
                let a = check_availability(&r.ingredient, item);
                (a.available, a.is_valid)
            }
            None => (0, r.ingredient.estimated_quantity <= 0.0),
        };
        if !ok {
            out.push(AvailabilityWarning {
                product_name: r.ingredient.product_name.clone(),
                inventory_item_id: item_id.to_string(),
                available,
                needed: r.ingredient.estimated_quantity,
            });
        }
    }
    out
}
