use std::collections::HashMap;

#[derive(Debug, Default, PartialEq)]
pub struct QueryString {
    items: HashMap<String, String>,
}

impl QueryString {
    pub fn from(buf: &str) -> Self {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(buf).unwrap_or_else(|_| vec![]);
        QueryString {
            items: pairs.into_iter().collect(),
        }
    }

    /// 1-based page number; anything missing or unparseable is page 1.
    pub fn page(&self) -> u32 {
        let val = match self.items.get("page") {
            Some(v) => v.parse().unwrap_or(1),
            None => 1,
        };
        if val == 0 {
            return 1;
        }
        val
    }

    /// Non-empty value of a filter parameter such as `tag` or `category`.
    pub fn filter(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(|v| v.as_str()).filter(|v| !v.is_empty())
    }
}
