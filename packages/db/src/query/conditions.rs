use serde_json::Value;

/// WHERE-clause fragments plus the parameters they bind.
///
/// Values never get spliced into the query text; each one is registered as a
/// `$pN` parameter and bound when the query runs.
#[derive(Debug, Default, Clone)]
pub struct Conditions {
    clauses: Vec<String>,
    bindings: Vec<(String, Value)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter and return its `$name` placeholder.
    pub fn param(&mut self, value: impl Into<Value>) -> String {
        let name = format!("p{}", self.bindings.len());
        self.bindings.push((name.clone(), value.into()));
        format!("${name}")
    }

    /// Add a raw clause. Any values it references must come from [`Self::param`].
    pub fn push(&mut self, clause: impl Into<String>) {
        self.clauses.push(clause.into());
    }

    pub fn eq(&mut self, column: &str, value: impl Into<Value>) {
        let p = self.param(value);
        self.push(format!("{column} = {p}"));
    }

    pub fn one_of(&mut self, column: &str, values: Vec<Value>) {
        let p = self.param(Value::Array(values));
        self.push(format!("{column} IN {p}"));
    }

    /// Match the record id of `table` against a raw key.
    pub fn record_is(&mut self, table: &str, key: impl Into<Value>) {
        let p = self.param(key);
        self.push(format!("id = type::thing('{table}', {p})"));
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// `WHERE a AND b ...`, or an empty string when unconstrained.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn into_bindings(self) -> Vec<(String, Value)> {
        self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_conditions_produce_no_where() {
        assert_eq!(Conditions::new().where_clause(), "");
    }

    #[test]
    fn clauses_are_joined_with_and() {
        let mut conditions = Conditions::new();
        conditions.eq("state", "pending");
        conditions.one_of("agent_id", vec![json!("a"), json!("b")]);
        assert_eq!(
            conditions.where_clause(),
            "WHERE state = $p0 AND agent_id IN $p1"
        );
        let bindings = conditions.into_bindings();
        assert_eq!(bindings[0], ("p0".to_string(), json!("pending")));
        assert_eq!(bindings[1], ("p1".to_string(), json!(["a", "b"])));
    }

    #[test]
    fn record_is_uses_type_thing() {
        let mut conditions = Conditions::new();
        conditions.record_is("job", "01ARZ3NDEKTSV4RRFFQ69G5FAV");
        assert_eq!(
            conditions.where_clause(),
            "WHERE id = type::thing('job', $p0)"
        );
    }
}
