//! Query construction for the CMS list surface.
//!
//! The CMS accepts `where[field][equals]=v` style parameters, with multiple
//! clauses nested under `where[and][i][...]`. The builder keeps clauses in
//! insertion order so queries are deterministic and cacheable.

/// A single where clause.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    Equals { field: String, value: String },
    In { field: String, values: Vec<String> },
    GreaterThan { field: String, value: String },
    LessThan { field: String, value: String },
}

/// Composable query against a CMS collection.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    clauses: Vec<Clause>,
    or_clauses: Vec<Clause>,
    depth: Option<u32>,
    limit: Option<u32>,
    page: Option<u32>,
    sort: Option<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_equals(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push(Clause::Equals {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.clauses.push(Clause::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn where_greater_than(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push(Clause::GreaterThan {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_less_than(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push(Clause::LessThan {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Add a clause to the `where[or][i]` group; any one of these matching
    /// satisfies the query (alongside all plain clauses).
    pub fn or_where_greater_than(
        mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.or_clauses.push(Clause::GreaterThan {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Relation population level.
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn sort(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(field.into());
        self
    }

    /// Render the query-string pairs the REST surface accepts.
    pub fn build(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();

        match self.clauses.len() {
            0 => {}
            1 if self.or_clauses.is_empty() => {
                Self::push_clause(&mut params, "where", &self.clauses[0])
            }
            _ => {
                for (i, clause) in self.clauses.iter().enumerate() {
                    Self::push_clause(&mut params, &format!("where[and][{i}]"), clause);
                }
            }
        }
        for (i, clause) in self.or_clauses.iter().enumerate() {
            Self::push_clause(&mut params, &format!("where[or][{i}]"), clause);
        }

        if let Some(depth) = self.depth {
            params.push(("depth".to_string(), depth.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(sort) = &self.sort {
            params.push(("sort".to_string(), sort.clone()));
        }

        params
    }

    fn push_clause(params: &mut Vec<(String, String)>, prefix: &str, clause: &Clause) {
        match clause {
            Clause::Equals { field, value } => {
                params.push((format!("{prefix}[{field}][equals]"), value.clone()));
            }
            Clause::In { field, values } => {
                for (j, value) in values.iter().enumerate() {
                    params.push((format!("{prefix}[{field}][in][{j}]"), value.clone()));
                }
            }
            Clause::GreaterThan { field, value } => {
                params.push((format!("{prefix}[{field}][greater_than]"), value.clone()));
            }
            Clause::LessThan { field, value } => {
                params.push((format!("{prefix}[{field}][less_than]"), value.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_equals_clause() {
        let params = QueryBuilder::new()
            .where_equals("environment", "dev")
            .build();
        assert_eq!(
            params,
            vec![("where[environment][equals]".to_string(), "dev".to_string())]
        );
    }

    #[test]
    fn multiple_clauses_nest_under_and() {
        let params = QueryBuilder::new()
            .where_equals("environment", "dev")
            .where_equals("isDefault", "true")
            .build();
        assert_eq!(
            params,
            vec![
                (
                    "where[and][0][environment][equals]".to_string(),
                    "dev".to_string()
                ),
                (
                    "where[and][1][isDefault][equals]".to_string(),
                    "true".to_string()
                ),
            ]
        );
    }

    #[test]
    fn where_in_enumerates_values() {
        let params = QueryBuilder::new()
            .where_in("status", ["active", "provisioning"])
            .build();
        assert_eq!(
            params,
            vec![
                ("where[status][in][0]".to_string(), "active".to_string()),
                (
                    "where[status][in][1]".to_string(),
                    "provisioning".to_string()
                ),
            ]
        );
    }

    #[test]
    fn depth_limit_page_sort_render_in_order() {
        let params = QueryBuilder::new()
            .where_equals("application", "app-1")
            .depth(1)
            .limit(1000)
            .page(2)
            .sort("createdAt")
            .build();
        assert_eq!(params[0].0, "where[application][equals]");
        assert_eq!(
            &params[1..],
            &[
                ("depth".to_string(), "1".to_string()),
                ("limit".to_string(), "1000".to_string()),
                ("page".to_string(), "2".to_string()),
                ("sort".to_string(), "createdAt".to_string()),
            ]
        );
    }

    #[test]
    fn empty_builder_renders_nothing() {
        assert!(QueryBuilder::new().build().is_empty());
    }

    #[test]
    fn comparison_clauses_render() {
        let params = QueryBuilder::new()
            .where_equals("isActive", "true")
            .where_less_than("lastSeen", "2026-01-01T00:00:00Z")
            .build();
        assert_eq!(
            params,
            vec![
                (
                    "where[and][0][isActive][equals]".to_string(),
                    "true".to_string()
                ),
                (
                    "where[and][1][lastSeen][less_than]".to_string(),
                    "2026-01-01T00:00:00Z".to_string()
                ),
            ]
        );
    }

    #[test]
    fn or_group_renders_separately() {
        let params = QueryBuilder::new()
            .or_where_greater_than("bytesLast24h", "0")
            .or_where_greater_than("messagesLast24h", "0")
            .build();
        assert_eq!(
            params,
            vec![
                (
                    "where[or][0][bytesLast24h][greater_than]".to_string(),
                    "0".to_string()
                ),
                (
                    "where[or][1][messagesLast24h][greater_than]".to_string(),
                    "0".to_string()
                ),
            ]
        );
    }
}
