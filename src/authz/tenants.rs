use std::collections::HashMap;

/// Candidate organizations for a tenant, in the order they are consulted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationIds(Vec<String>);

impl OrganizationIds {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl From<Vec<String>> for OrganizationIds {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}

impl<'a> IntoIterator for &'a OrganizationIds {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Tenant to organization mapping. Read-only once the server starts.
#[derive(Debug, Clone, Default)]
pub struct TenantMapping(HashMap<String, OrganizationIds>);

impl TenantMapping {
    pub fn get(&self, tenant: &str) -> Option<&OrganizationIds> {
        self.0.get(tenant)
    }

    /// Add `other` on top of this mapping. A tenant present in both takes
    /// the list from `other`.
    pub fn merge(&mut self, other: HashMap<String, Vec<String>>) {
        self.0
            .extend(other.into_iter().map(|(tenant, ids)| (tenant, ids.into())));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, Vec<String>>> for TenantMapping {
    fn from(mappings: HashMap<String, Vec<String>>) -> Self {
        let mut mapping = Self::default();
        mapping.merge(mappings);
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orgs(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_order_is_preserved() {
        let mapping = TenantMapping::from(HashMap::from([(
            "team-a".to_string(),
            orgs(&["org-3", "org-1", "org-2"]),
        )]));
        let ids: Vec<_> = mapping.get("team-a").unwrap().iter().cloned().collect();
        assert_eq!(ids, ["org-3", "org-1", "org-2"]);
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut mapping = TenantMapping::from(HashMap::from([
            ("team-a".to_string(), orgs(&["org-1"])),
            ("team-b".to_string(), orgs(&["org-2"])),
        ]));
        mapping.merge(HashMap::from([("team-a".to_string(), orgs(&["org-9", "org-8"]))]));

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("team-a").unwrap().as_slice(), ["org-9", "org-8"]);
        assert_eq!(mapping.get("team-b").unwrap().as_slice(), ["org-2"]);
        assert!(mapping.get("team-c").is_none());
    }
}
