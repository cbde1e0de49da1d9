//! Fixed reference data: the brands exported and the season calendar.

mod brand;
mod season;

pub use brand::{BRANDS, Brand, find_brand};
pub use season::{DEFAULT_SEASONS, Season, default_seasons, unique_seasons};
