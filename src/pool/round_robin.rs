//! Round-robin endpoint rotation.

use crate::pool::endpoint::Endpoint;

/// Ordered endpoints plus a cursor into them.
///
/// The cursor always stays in `[0, len)`; an empty rotation yields nothing.
#[derive(Debug, Default)]
pub struct RoundRobin {
    endpoints: Vec<Endpoint>,
    cursor: usize,
}

impl RoundRobin {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            cursor: 0,
        }
    }

    /// Endpoint under the cursor, without moving it.
    pub fn peek(&self) -> Option<&Endpoint> {
        self.endpoints.get(self.cursor)
    }

    pub fn advance(&mut self) {
        if !self.endpoints.is_empty() {
            self.cursor = (self.cursor + 1) % self.endpoints.len();
        }
    }

    /// Return the endpoint under the cursor and move past it.
    pub fn next_endpoint(&mut self) -> Option<Endpoint> {
        let endpoint = self.peek()?.clone();
        self.advance();
        Some(endpoint)
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn endpoint(name: &str, port: u16) -> Endpoint {
        Endpoint::new(
            name,
            format!("http://127.0.0.1:{}", port).parse().unwrap(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_round_robin() {
        let mut rr = RoundRobin::new(vec![
            endpoint("a", 8080),
            endpoint("b", 8081),
            endpoint("c", 8082),
        ]);

        let names: Vec<String> = (0..4)
            .map(|_| rr.next_endpoint().unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "c", "a"]);
        assert_eq!(rr.cursor(), 1);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let mut rr = RoundRobin::new(vec![endpoint("a", 8080), endpoint("b", 8081)]);
        assert_eq!(rr.peek().unwrap().name(), "a");
        assert_eq!(rr.peek().unwrap().name(), "a");
        rr.advance();
        assert_eq!(rr.peek().unwrap().name(), "b");
    }

    #[test]
    fn test_empty() {
        let mut rr = RoundRobin::default();
        assert!(rr.is_empty());
        assert!(rr.next_endpoint().is_none());
        rr.advance();
        assert_eq!(rr.cursor(), 0);
    }
}
