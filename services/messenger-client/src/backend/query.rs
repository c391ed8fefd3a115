// Query builder sederhana untuk endpoint REST tabel (konvensi PostgREST)
use std::fmt::Display;

use super::Table;

#[derive(Debug, Clone)]
pub struct Query {
    table: Table,
    params: Vec<(String, String)>,
}

impl Query {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            params: Vec::new(),
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    pub fn neq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_string(), format!("neq.{}", value)));
        self
    }

    pub fn in_list<T: Display>(mut self, column: &str, values: &[T]) -> Self {
        let joined = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.params.push((column.to_string(), format!("in.({})", joined)));
        self
    }

    // Filter OR, contoh: (username.ilike.*budi*,display_name.ilike.*budi*)
    pub fn or(mut self, expression: &str) -> Self {
        self.params.push(("or".to_string(), format!("({})", expression)));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool, nulls_last: bool) -> Self {
        let mut value = format!("{}.{}", column, if ascending { "asc" } else { "desc" });
        if nulls_last {
            value.push_str(".nullslast");
        }
        self.params.push(("order".to_string(), value));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.params.push(("limit".to_string(), limit.to_string()));
        self
    }

    // Path lengkap dengan query string yang sudah di-encode
    pub fn to_path(&self) -> String {
        let base = format!("/rest/v1/{}", self.table.as_str());
        if self.params.is_empty() {
            return base;
        }

        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        format!("{}?{}", base, encoded)
    }
}

// Bersihkan input user sebelum masuk ke pola ilike (karakter sintaks filter dibuang)
pub fn sanitize_search_term(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%' | '.' | ':' | '"' | '\\'))
        .collect::<String>()
        .trim()
        .to_string()
}
