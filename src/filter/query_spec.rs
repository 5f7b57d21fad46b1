use serde_json::Value;

use super::filter_order::FilterOrder;
use super::params::{ParamValue, QueryParams};
use super::types::{Condition, FilterOp, Pagination, Projection, QuerySpec, SortKey};
use crate::config::QueryConfig;

/// Query-string keys that steer the query instead of filtering it.
pub const CONTROL_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Internal version counter, hidden unless explicitly requested.
pub const VERSION_FIELD: &str = "__v";

/// Builds a [`QuerySpec`] from request parameters, one stage at a time.
///
/// ```ignore
/// let spec = QuerySpecBuilder::new(collection.base_filter(), &config.query)
///     .filter(&params)
///     .sort(&params)
///     .limit_fields(&params)
///     .paginate(&params)
///     .build();
/// ```
pub struct QuerySpecBuilder<'a> {
    config: &'a QueryConfig,
    base: Vec<Condition>,
    filter: Vec<Condition>,
    sort: Vec<SortKey>,
    projection: Projection,
    pagination: Pagination,
}

impl<'a> QuerySpecBuilder<'a> {
    pub fn new(base: Vec<Condition>, config: &'a QueryConfig) -> Self {
        Self {
            config,
            base,
            filter: vec![],
            sort: FilterOrder::default_order(),
            projection: Projection::Exclude(vec![VERSION_FIELD.to_string()]),
            pagination: Pagination::new(1, config.default_limit),
        }
    }

    /// Adds a condition ahead of the caller's filters (nested resources).
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.filter.push(condition);
        self
    }

    pub fn filter(mut self, params: &QueryParams) -> Self {
        for (key, value) in params.iter() {
            if CONTROL_KEYS.contains(&key.as_str()) {
                continue;
            }
            match value {
                ParamValue::Single(v) => {
                    self.filter.push(Condition::eq(key.clone(), Value::String(v.clone())));
                }
                ParamValue::Nested(ops) => {
                    for (op, v) in ops {
                        self.filter.push(Condition::new(key.clone(), FilterOp::from_key(op), Value::String(v.clone())));
                    }
                }
            }
        }
        self
    }

    pub fn sort(mut self, params: &QueryParams) -> Self {
        if let Some(sort) = params.get_str("sort") {
            let keys = FilterOrder::parse(sort);
            if !keys.is_empty() {
                self.sort = keys;
            }
        }
        self
    }

    pub fn limit_fields(mut self, params: &QueryParams) -> Self {
        if let Some(fields) = params.get_str("fields") {
            let fields: Vec<String> = fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
            if !fields.is_empty() {
                self.projection = Projection::Include(fields);
            }
        }
        self
    }

    pub fn paginate(mut self, params: &QueryParams) -> Self {
        let page = positive_int(params.get_str("page")).unwrap_or(1);
        let mut limit = positive_int(params.get_str("limit")).unwrap_or(self.config.default_limit);

        if let Some(max) = self.config.max_limit {
            if limit > max {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max);
                limit = max;
            }
        }

        self.pagination = Pagination::new(page, limit);
        self
    }

    pub fn build(self) -> QuerySpec {
        QuerySpec {
            base: self.base,
            filter: self.filter,
            sort: self.sort,
            projection: self.projection,
            pagination: self.pagination,
        }
    }
}

fn positive_int(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok()).filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::SortDirection;

    fn config() -> QueryConfig {
        QueryConfig { default_limit: 100, max_limit: None }
    }

    fn build(query: &str, config: &QueryConfig) -> QuerySpec {
        let params = QueryParams::parse(query);
        QuerySpecBuilder::new(vec![Condition::ne("secretTour", true)], config)
            .filter(&params)
            .sort(&params)
            .limit_fields(&params)
            .paginate(&params)
            .build()
    }

    #[test]
    fn gte_maps_to_greater_or_equal() {
        let spec = build("duration[gte]=5&difficulty=easy", &config());

        let duration = spec.condition_for("duration").expect("duration condition");
        assert_eq!(duration.op, FilterOp::Gte);
        assert_eq!(duration.value, Value::String("5".into()));

        let difficulty = spec.condition_for("difficulty").expect("difficulty condition");
        assert_eq!(difficulty.op, FilterOp::Eq);
    }

    #[test]
    fn every_comparison_operator_is_recognised() {
        let spec = build("price[gt]=1&price[lt]=9&ratingsAverage[lte]=4", &config());
        let ops: Vec<&FilterOp> = spec.filter.iter().map(|c| &c.op).collect();
        assert!(ops.contains(&&FilterOp::Gt));
        assert!(ops.contains(&&FilterOp::Lt));
        assert!(ops.contains(&&FilterOp::Lte));
    }

    #[test]
    fn unknown_operators_pass_through() {
        let spec = build("price[regex]=.*", &config());
        assert_eq!(spec.filter[0].op, FilterOp::Other("regex".to_string()));
    }

    #[test]
    fn control_keys_are_not_filters() {
        let spec = build("page=2&sort=price&limit=5&fields=name", &config());
        assert!(spec.filter.is_empty());
    }

    #[test]
    fn base_filter_comes_first() {
        let spec = build("secretTour=true", &config());
        let first = spec.conditions().next().expect("base condition");
        assert_eq!(first, &Condition::ne("secretTour", true));
        assert_eq!(spec.conditions().count(), 2);
    }

    #[test]
    fn page_two_of_ten_skips_ten() {
        let spec = build("limit=10&page=2", &config());
        assert_eq!(spec.pagination, Pagination { page: 2, limit: 10, skip: 10 });
    }

    #[test]
    fn bad_pagination_falls_back_to_defaults() {
        for query in ["page=abc&limit=xyz", "page=0&limit=0", "page=-3&limit=-1", ""] {
            let spec = build(query, &config());
            assert_eq!(spec.pagination, Pagination { page: 1, limit: 100, skip: 0 }, "query {query:?}");
        }
    }

    #[test]
    fn limit_is_unbounded_without_a_ceiling() {
        let spec = build("limit=1000000", &config());
        assert_eq!(spec.pagination.limit, 1_000_000);
    }

    #[test]
    fn configured_ceiling_clamps_limit() {
        let capped = QueryConfig { default_limit: 100, max_limit: Some(500) };
        let spec = build("limit=1000000&page=3", &capped);
        assert_eq!(spec.pagination, Pagination { page: 3, limit: 500, skip: 1000 });
    }

    #[test]
    fn default_sort_and_projection() {
        let spec = build("", &config());
        assert_eq!(spec.sort[0], SortKey { field: "createdAt".into(), direction: SortDirection::Desc });
        assert_eq!(spec.projection, Projection::Exclude(vec![VERSION_FIELD.to_string()]));
    }

    #[test]
    fn fields_become_an_allow_list() {
        let spec = build("fields=name,price", &config());
        assert_eq!(spec.projection, Projection::Include(vec!["name".into(), "price".into()]));
    }
}
