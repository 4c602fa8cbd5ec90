use super::types::{CompareOp, Literal, Predicate, SqlParam};

/// Renders a [`Predicate`] as a JSONB condition over the `doc` column.
/// Keys and values are always bound as parameters.
pub struct FilterWhere {
    param_values: Vec<SqlParam>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(predicate: Option<&Predicate>, starting_param_index: usize) -> (String, Vec<SqlParam>) {
        let mut filter_where = Self::new(starting_param_index);
        let sql = match predicate {
            Some(p) => filter_where.build(p),
            None => "TRUE".to_string(),
        };
        (sql, filter_where.param_values)
    }

    fn build(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Compare { key, op, value } => self.build_compare(key, *op, value),
            Predicate::Regex { key, pattern } => {
                let k = self.param(SqlParam::Text(key.clone()));
                let p = self.param(SqlParam::Text(pattern.clone()));
                format!(
                    "(CASE jsonb_typeof(doc->{k}::text) \
                     WHEN 'string' THEN (doc->>{k}::text) ~ {p} \
                     WHEN 'number' THEN (doc->>{k}::text) ~ {p} \
                     WHEN 'array' THEN EXISTS (SELECT 1 FROM jsonb_array_elements(doc->{k}::text) e \
                     WHERE jsonb_typeof(e) = 'string' AND (e #>> '{{}}') ~ {p}) \
                     ELSE FALSE END)",
                    k = k,
                    p = p
                )
            }
            Predicate::And(parts) => self.build_group(parts, " AND ", "TRUE"),
            Predicate::Or(parts) => self.build_group(parts, " OR ", "FALSE"),
        }
    }

    fn build_group(&mut self, parts: &[Predicate], joiner: &str, empty: &str) -> String {
        if parts.is_empty() {
            return empty.to_string();
        }
        let sql_parts: Vec<String> = parts.iter().map(|p| self.build(p)).collect();
        format!("({})", sql_parts.join(joiner))
    }

    fn build_compare(&mut self, key: &str, op: CompareOp, value: &Literal) -> String {
        let k = self.param(SqlParam::Text(key.to_string()));
        match op {
            CompareOp::Eq | CompareOp::Ne => {
                let v = self.param(SqlParam::Json(value.to_json()));
                let contains = format!("COALESCE(doc->{}::text @> {}::jsonb, FALSE)", k, v);
                if op == CompareOp::Eq { contains } else { format!("NOT {}", contains) }
            }
            _ => match value {
                Literal::Int(i) => {
                    let v = self.param(SqlParam::Int(*i));
                    format!(
                        "(CASE WHEN jsonb_typeof(doc->{k}::text) = 'number' \
                         THEN (doc->>{k}::text)::numeric {op} {v}::bigint ELSE FALSE END)",
                        k = k,
                        op = op.to_sql(),
                        v = v
                    )
                }
                Literal::Str(s) => {
                    let v = self.param(SqlParam::Text(s.clone()));
                    format!(
                        "(CASE WHEN jsonb_typeof(doc->{k}::text) = 'string' \
                         THEN (doc->>{k}::text) {op} {v}::text ELSE FALSE END)",
                        k = k,
                        op = op.to_sql(),
                        v = v
                    )
                }
                Literal::Bool(_) => "FALSE".to_string(),
            },
        }
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::search::parse_search_keyword;

    #[test]
    fn no_predicate_is_true() {
        let (sql, params) = FilterWhere::generate(None, 1);
        assert_eq!(sql, "TRUE");
        assert!(params.is_empty());
    }

    #[test]
    fn equality_uses_containment_and_numbers_params_from_offset() {
        let predicate = Predicate::eq("record_id", "pytest");
        let (sql, params) = FilterWhere::generate(Some(&predicate), 1);
        assert_eq!(sql, "COALESCE(doc->$2::text @> $3::jsonb, FALSE)");
        assert_eq!(
            params,
            vec![
                SqlParam::Text("record_id".into()),
                SqlParam::Json(serde_json::json!("pytest"))
            ]
        );
    }

    #[test]
    fn range_is_guarded_by_json_type() {
        let predicate = parse_search_keyword(Some("time>=0"), &[]).unwrap().unwrap();
        let (sql, params) = FilterWhere::generate(Some(&predicate), 0);
        assert!(sql.contains("jsonb_typeof(doc->$1::text) = 'number'"));
        assert!(sql.contains(">= $2::bigint"));
        assert_eq!(params[1], SqlParam::Int(0));
    }

    #[test]
    fn or_groups_are_parenthesised() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let predicate = parse_search_keyword(Some("x"), &columns).unwrap().unwrap();
        let (sql, params) = FilterWhere::generate(Some(&predicate), 0);
        assert!(sql.starts_with("((CASE"));
        assert!(sql.contains(") OR (CASE"));
        assert_eq!(params.len(), 4);
    }
}
