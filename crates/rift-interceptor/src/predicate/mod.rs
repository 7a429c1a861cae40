//! Restriction matching for request handlers.
//!
//! A handler holds an ordered list of [`Restriction`]s combined with logical
//! AND. Each restriction is either a static declaration (headers, search
//! params, body, with partial or exact semantics) or a computed predicate that
//! may suspend while it decides.
//!
//! # Module Structure
//!
//! - `restriction` - Restriction types and evaluation
//! - `field_matcher` - Header and search param matching
//! - `body_matcher` - Body matching (JSON, text, form, binary)
//! - `path_matcher` - Literal and templated path patterns

mod body_matcher;
mod field_matcher;
mod path_matcher;
mod restriction;

pub use body_matcher::{body_matches, json_contains};
pub use field_matcher::{fields_match, FieldSource};
pub use path_matcher::{PathPattern, PathPatternError};
pub use restriction::{evaluate_restrictions, Restriction, RestrictionError, StaticRestriction};
