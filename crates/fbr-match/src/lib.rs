//! fbr-match
//!
//! Binds free-text recipe ingredients to inventory records.
//!
//! - [`Matcher`] scores textual similarity; [`TokenContainmentMatcher`] is the
//!   default strategy (exact > containment > token overlap, no edit distance).
//! - [`Resolver`] picks at most one inventory record per ingredient above a
//!   confidence threshold.
//! - [`validate`] screens untrusted generator payloads entry by entry.
//!
//! Deterministic, pure logic. No IO. Inventory is only ever read here.

mod matcher;
mod resolver;
pub mod validate;

pub use matcher::{Matcher, TokenContainmentMatcher};
pub use resolver::{
    availability_report, available_quantity, check_availability, resolve_all, Availability,
    AvailabilityWarning, Resolver, DEFAULT_BRAND_WEIGHT, DEFAULT_THRESHOLD,
};
pub use validate::{parse_recipe, validate_ingredients, IngredientRejection, RecipeShapeError};
