// Query-string building for listing endpoints

use url::form_urlencoded;

/// Ordered list of query parameters, percent-encoded on output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    pub fn push_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.push(key, v),
            None => self,
        }
    }

    /// `page[number]=<page>`
    pub fn page(self, page: u32) -> Self {
        self.push("page[number]", page)
    }

    /// `filter[<field>]=<value>`
    pub fn filter(self, field: &str, value: impl ToString) -> Self {
        self.push(format!("filter[{}]", field), value)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `application/x-www-form-urlencoded` serialization
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.pairs)
            .finish()
    }
}

/// Filters for listing prospects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProspectQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub page: Option<u32>,
}

impl ProspectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_name(mut self, value: impl Into<String>) -> Self {
        self.first_name = Some(value.into());
        self
    }

    pub fn last_name(mut self, value: impl Into<String>) -> Self {
        self.last_name = Some(value.into());
        self
    }

    pub fn company_name(mut self, value: impl Into<String>) -> Self {
        self.company_name = Some(value.into());
        self
    }

    pub fn email(mut self, value: impl Into<String>) -> Self {
        self.email = Some(value.into());
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(page) = self.page {
            query = query.page(page);
        }
        if let Some(ref v) = self.first_name {
            query = query.filter("personal/name/first", v);
        }
        if let Some(ref v) = self.last_name {
            query = query.filter("personal/name/last", v);
        }
        if let Some(ref v) = self.email {
            query = query.filter("contact/email", v);
        }
        if let Some(ref v) = self.company_name {
            query = query.filter("company/name", v);
        }
        query
    }
}
