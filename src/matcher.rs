use crate::model::RequestRecord;

/// Part of a captured request that a search looks into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Body,
    Query,
    Headers,
    All,
}

impl SearchScope {
    /// Unknown or empty scopes search everywhere.
    pub fn parse(scope: &str) -> Self {
        match scope {
            "body" => SearchScope::Body,
            "query" => SearchScope::Query,
            "headers" => SearchScope::Headers,
            _ => SearchScope::All,
        }
    }

    fn includes(self, other: SearchScope) -> bool {
        self == SearchScope::All || self == other
    }
}

impl RequestRecord {
    /// Case-sensitive substring search. Header names are never searched,
    /// only their values. An empty query matches every record.
    pub fn matches(&self, query: &str, scope: SearchScope) -> bool {
        if scope.includes(SearchScope::Body) && contains_bytes(&self.body, query.as_bytes()) {
            return true;
        }

        if scope.includes(SearchScope::Query) && self.query.contains(query) {
            return true;
        }

        scope.includes(SearchScope::Headers)
            && self
                .headers
                .values()
                .flatten()
                .any(|value| value.contains(query))
    }
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}
