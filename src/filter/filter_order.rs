use super::types::SortKey;

pub struct FilterOrder;

impl FilterOrder {
    /// Parses `price,-ratingsAverage` into sort keys; `-` marks descending.
    pub fn parse(sort: &str) -> Vec<SortKey> {
        let mut out = Vec::new();
        for part in sort.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.strip_prefix('-') {
                Some(field) if !field.is_empty() => out.push(SortKey::desc(field)),
                Some(_) => {}
                None => out.push(SortKey::asc(trimmed)),
            }
        }
        out
    }

    /// Newest first, unique id as tie-break so pages are stable.
    pub fn default_order() -> Vec<SortKey> {
        vec![SortKey::desc("createdAt"), SortKey::asc("id")]
    }

    pub fn generate_sql(keys: &[SortKey], mut field_expr: impl FnMut(&str) -> String) -> String {
        if keys.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = keys
            .iter()
            .map(|k| format!("{} {}", field_expr(&k.field), k.direction.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
