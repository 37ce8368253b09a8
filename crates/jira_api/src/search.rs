//! Filter based ticket queries and their URL and query-language encodings.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::util::{form_decode, form_encode};

/// Comparison applied by a search filter, encoded as a value prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOperator {
    #[default]
    Is,
    IsNot,
    Contains,
    ContainsNot,
    BeginsWith,
    EndsWith,
}

impl CompareOperator {
    /// Prefixes are probed longest first so `!~` is never read as `!`.
    const PREFIX_ORDER: [CompareOperator; 5] = [
        CompareOperator::ContainsNot,
        CompareOperator::IsNot,
        CompareOperator::Contains,
        CompareOperator::BeginsWith,
        CompareOperator::EndsWith,
    ];

    pub fn query_value(&self) -> &'static str {
        match self {
            CompareOperator::Is => "",
            CompareOperator::IsNot => "!",
            CompareOperator::Contains => "~",
            CompareOperator::ContainsNot => "!~",
            CompareOperator::BeginsWith => "^",
            CompareOperator::EndsWith => "$",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CompareOperator::Is => "is",
            CompareOperator::IsNot => "is not",
            CompareOperator::Contains => "contains",
            CompareOperator::ContainsNot => "does not contain",
            CompareOperator::BeginsWith => "begins with",
            CompareOperator::EndsWith => "ends with",
        }
    }

    /// Detects the operator encoded at the start of a decoded filter value.
    pub fn from_url(value: &str) -> Self {
        Self::PREFIX_ORDER
            .into_iter()
            .find(|operator| value.starts_with(operator.query_value()))
            .unwrap_or(CompareOperator::Is)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub field_name: String,
    pub operator: CompareOperator,
    pub values: Vec<String>,
}

impl SearchFilter {
    pub fn new(field_name: impl Into<String>, operator: CompareOperator) -> Self {
        Self {
            field_name: field_name.into(),
            operator,
            values: Vec::new(),
        }
    }

    pub fn add_value(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }
}

/// A ticket query. Filters keep their first-seen order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Search {
    filters: Vec<SearchFilter>,
    order_by: Option<String>,
    ascending: bool,
    max: Option<u32>,
}

impl Default for Search {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            order_by: None,
            ascending: true,
            max: None,
        }
    }
}

impl Search {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the output of [`Search::to_url`].
    pub fn from_url(url: &str) -> Self {
        let mut search = Self::new();
        for token in url.split('&').filter(|token| !token.is_empty()) {
            let Some((raw_key, raw_value)) = token.split_once('=') else {
                continue;
            };
            let key = form_decode(raw_key);
            let value = form_decode(raw_value);
            match key.as_str() {
                "order" => search.order_by = Some(value),
                "desc" => search.ascending = value != "1",
                "group" | "groupdesc" | "verbose" => {}
                "max" => match value.parse::<u32>() {
                    Ok(max) => search.max = Some(max),
                    Err(_) => warn!(value = %value, "illegal max value in query url, expected a number"),
                },
                _ => search.add_filter(&key, &value),
            }
        }
        search
    }

    /// Adds a value for `field`; the operator is taken from the value prefix
    /// when the field is first seen.
    pub fn add_filter(&mut self, field: &str, value: &str) {
        let index = match self.filters.iter().position(|f| f.field_name == field) {
            Some(index) => index,
            None => {
                self.filters
                    .push(SearchFilter::new(field, CompareOperator::from_url(value)));
                self.filters.len() - 1
            }
        };
        let filter = &mut self.filters[index];
        let stripped = value
            .strip_prefix(filter.operator.query_value())
            .unwrap_or(value);
        filter.add_value(stripped);
    }

    /// Adds or replaces the filter for its field.
    pub fn set_filter(&mut self, filter: SearchFilter) {
        match self
            .filters
            .iter_mut()
            .find(|existing| existing.field_name == filter.field_name)
        {
            Some(existing) => *existing = filter,
            None => self.filters.push(filter),
        }
    }

    pub fn filters(&self) -> &[SearchFilter] {
        &self.filters
    }

    pub fn order_by(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    pub fn set_order_by(&mut self, order_by: impl Into<String>) {
        self.order_by = Some(order_by.into());
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    pub fn set_ascending(&mut self, ascending: bool) {
        self.ascending = ascending;
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    pub fn set_max(&mut self, max: Option<u32>) {
        self.max = max;
    }

    /// Query language string; empty or starting with `&`.
    pub fn to_query(&self, supports_max: bool) -> String {
        let mut query = String::new();
        if let Some(order_by) = &self.order_by {
            query.push_str("&order=");
            query.push_str(order_by);
            if !self.ascending {
                query.push_str("&desc=1");
            }
        }
        if let (true, Some(max)) = (supports_max, self.max) {
            query.push_str(&format!("&max={max}"));
        }
        for filter in &self.filters {
            query.push('&');
            query.push_str(&filter.field_name);
            query.push_str(filter.operator.query_value());
            query.push('=');
            let values: Vec<String> = filter.values.iter().map(|v| escape_value(v)).collect();
            query.push_str(&values.join("|"));
        }
        query
    }

    /// Query passed to `ticket.query`; always carries an order so that an
    /// empty search still matches every ticket.
    pub fn to_rpc_query(&self, supports_max: bool) -> String {
        let query = self.to_query(supports_max);
        if self.order_by.is_some() {
            query.trim_start_matches('&').to_string()
        } else {
            format!("order=id{query}")
        }
    }

    /// URL encoded query string; empty or starting with `&`.
    pub fn to_url(&self) -> String {
        let mut url = String::new();
        match &self.order_by {
            Some(order_by) => {
                url.push_str("&order=");
                url.push_str(order_by);
                if !self.ascending {
                    url.push_str("&desc=1");
                }
            }
            None if self.filters.is_empty() => url.push_str("&order=id"),
            None => {}
        }
        if let Some(max) = self.max {
            url.push_str(&format!("&max={max}"));
        }
        for filter in &self.filters {
            for value in &filter.values {
                url.push('&');
                url.push_str(&filter.field_name);
                url.push('=');
                url.push_str(&form_encode(filter.operator.query_value()));
                url.push_str(&form_encode(value));
            }
        }
        url
    }
}

fn escape_value(value: &str) -> String {
    value.replace('&', "\\&").replace('|', "\\|")
}
