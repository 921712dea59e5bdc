//! Labels for census population types, keyed by the id a dataset is based on

use once_cell::sync::Lazy;
use std::collections::HashMap;

static POPULATION_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("UR", "All usual residents"),
        ("UR_HH", "All usual residents in households"),
        ("UR_CE", "All usual residents in communal establishments"),
        ("HH", "All households"),
        ("HRP", "All household reference persons"),
        ("FRP", "All family reference persons"),
        ("dwelling", "All dwellings"),
        ("Teaching-Dataset", "Census 2011 teaching file"),
    ])
});

/// Label for a population type id, if it is a known one
pub fn population_type_label(id: &str) -> Option<&'static str> {
    POPULATION_TYPES.get(id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown() {
        assert_eq!(population_type_label("UR"), Some("All usual residents"));
        assert_eq!(population_type_label("nope"), None);
    }
}
