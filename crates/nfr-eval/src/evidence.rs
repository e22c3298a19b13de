use indexmap::IndexMap;

/// The matched-evidence record for a single key/instance, used to template
/// downstream labels/annotations.
///
/// Field order is stable: `Name` first, then `Value` if present, then any
/// remaining attributes in the order they appeared in the input instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedElement(IndexMap<String, String>);

impl MatchedElement {
    /// Evidence for a flag feature: `{Name: k}`.
    pub fn name(name: impl Into<String>) -> Self {
        let mut m = IndexMap::with_capacity(1);
        m.insert("Name".to_string(), name.into());
        Self(m)
    }

    /// Evidence for an attribute feature: `{Name: k, Value: v}`.
    pub fn name_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut m = IndexMap::with_capacity(2);
        m.insert("Name".to_string(), name.into());
        m.insert("Value".to_string(), value.into());
        Self(m)
    }

    /// Evidence for an instance feature: the full (or sub-) attribute bag, in
    /// input order.
    pub fn from_attributes<'a, I>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        Self(
            attrs
                .into_iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
