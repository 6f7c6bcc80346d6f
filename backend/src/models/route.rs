//! Routes through the road network

use serde::{Deserialize, Serialize};

/// An immutable ordered list of edge ids with a unique id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    id: String,
    edges: Vec<String>,
}

impl Route {
    /// # Panics
    /// Panics if `edges` is empty
    pub fn new(id: String, edges: Vec<String>) -> Self {
        assert!(!edges.is_empty(), "route must contain at least one edge");
        Self { id, edges }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn edges(&self) -> &[String] {
        &self.edges
    }

    /// First edge of the route
    pub fn origin(&self) -> &str {
        &self.edges[0]
    }

    /// Last edge of the route
    pub fn destination(&self) -> &str {
        &self.edges[self.edges.len() - 1]
    }
}

/// Incremental `route-<n>` id source
#[derive(Debug, Clone, Default)]
pub struct RouteIdGenerator {
    next: u64,
}

impl RouteIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("route-{}", self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_and_destination() {
        let route = Route::new(
            "route-0".to_string(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        );
        assert_eq!(route.origin(), "a");
        assert_eq!(route.destination(), "c");
    }

    #[test]
    fn test_ids_are_unique_and_incremental() {
        let mut ids = RouteIdGenerator::new();
        assert_eq!(ids.next_id(), "route-0");
        assert_eq!(ids.next_id(), "route-1");
    }
}
