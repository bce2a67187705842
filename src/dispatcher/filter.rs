//! Filter-criteria matching.
//!
//! Each satisfied condition adds its weight to a [`MatchWeight`]: multi-valued
//! groups (`ty`, `lbl`, `cty`) add their cardinality when any one value
//! matches, every other condition adds one. AND needs the full weight, OR any.

use crate::model::{FilterCriteria, FilterOperation, Resource, ResourceType};
use serde_json::Value;
use std::collections::BTreeMap;

/// Matched weight against the achievable total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWeight {
    matched: usize,
    total: usize,
}

impl MatchWeight {
    pub const fn new(total: usize) -> Self {
        Self { matched: 0, total }
    }

    pub fn add(&mut self, weight: usize) {
        self.matched += weight;
    }

    fn add_if(&mut self, condition: bool) {
        if condition {
            self.matched += 1;
        }
    }

    /// Without any condition everything matches, whatever the combinator.
    pub fn is_satisfied(&self, fo: FilterOperation) -> bool {
        if self.total == 0 {
            return true;
        }
        match fo {
            FilterOperation::And => self.matched == self.total,
            FilterOperation::Or => self.matched > 0,
        }
    }
}

pub fn matches(
    resource: &Resource,
    criteria: &FilterCriteria,
    attributes: &BTreeMap<String, Value>,
    fo: FilterOperation,
) -> bool {
    let mut weight = MatchWeight::new(criteria.weight() + attributes.len());

    if criteria.ty.contains(&resource.ty) {
        weight.add(criteria.ty.len());
    }

    if let Some(crb) = criteria.crb {
        weight.add_if(resource.ct < crb);
    }
    if let Some(cra) = criteria.cra {
        weight.add_if(resource.ct > cra);
    }
    if let Some(ms) = criteria.ms {
        weight.add_if(resource.lt > ms);
    }
    if let Some(us) = criteria.us {
        weight.add_if(resource.lt < us);
    }
    if let Some(st) = resource.st {
        if let Some(sts) = criteria.sts {
            weight.add_if(st > sts);
        }
        if let Some(stb) = criteria.stb {
            weight.add_if(st < stb);
        }
    }
    if let Some(exb) = criteria.exb {
        weight.add_if(resource.et < exb);
    }
    if let Some(exa) = criteria.exa {
        weight.add_if(resource.et > exa);
    }

    if criteria.lbl.iter().any(|label| resource.lbl.contains(label)) {
        weight.add(criteria.lbl.len());
    }

    if matches!(resource.ty, ResourceType::ContentInstance | ResourceType::FlexContainer) {
        if let Some(cs) = resource.cs {
            if let Some(sza) = criteria.sza {
                weight.add_if(cs >= sza);
            }
            if let Some(szb) = criteria.szb {
                weight.add_if(cs < szb);
            }
        }
    }

    if resource.ty == ResourceType::ContentInstance {
        if let Some(cnf) = &resource.cnf {
            if criteria.cty.contains(cnf) {
                weight.add(criteria.cty.len());
            }
        }
    }

    for (name, expected) in attributes {
        let Some(actual) = resource.attribute(name) else {
            continue;
        };
        let actual = plain_string(&actual);
        let matched = match expected {
            Value::String(pattern) if pattern.contains('*') => wildcard_match(pattern, &actual),
            other => plain_string(other) == actual,
        };
        weight.add_if(matched);
    }

    weight.is_satisfied(fo)
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Matches `text` against `pattern`, where `*` stands for any run of characters.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn cin(labels: &[&str]) -> Resource {
        let mut cin = Resource::new(ResourceType::ContentInstance, "cin1", "reading", Some("cnt1".into()));
        cin.lbl = labels.iter().map(|l| l.to_string()).collect();
        cin.cs = Some(12);
        cin.st = Some(0);
        cin.cnf = Some("text/plain:0".into());
        cin
    }

    fn no_attributes() -> BTreeMap<String, Value> {
        BTreeMap::new()
    }

    #[test]
    fn zero_conditions_always_match() {
        let criteria = FilterCriteria::default();
        assert!(matches(&cin(&[]), &criteria, &no_attributes(), FilterOperation::And));
        assert!(matches(&cin(&[]), &criteria, &no_attributes(), FilterOperation::Or));
    }

    #[test]
    fn type_group_counts_once_for_and() {
        let criteria = FilterCriteria {
            ty: vec![ResourceType::Container, ResourceType::ContentInstance],
            lbl: vec!["x".into()],
            ..FilterCriteria::default()
        };
        assert!(matches(&cin(&["x"]), &criteria, &no_attributes(), FilterOperation::And));
        assert!(!matches(&cin(&["y"]), &criteria, &no_attributes(), FilterOperation::And));
        assert!(matches(&cin(&["y"]), &criteria, &no_attributes(), FilterOperation::Or));
    }

    #[test]
    fn time_and_size_bounds() {
        let now = Utc::now();
        let criteria = FilterCriteria {
            cra: Some(now - Duration::hours(1)),
            crb: Some(now + Duration::hours(1)),
            sza: Some(10),
            szb: Some(13),
            ..FilterCriteria::default()
        };
        assert!(matches(&cin(&[]), &criteria, &no_attributes(), FilterOperation::And));

        let too_small = FilterCriteria { sza: Some(13), ..criteria.clone() };
        assert!(!matches(&cin(&[]), &too_small, &no_attributes(), FilterOperation::And));

        // Size bounds never hold for types without content size.
        let cnt = Resource::new(ResourceType::Container, "cnt1", "box", None);
        let size_only = FilterCriteria { sza: Some(0), ..FilterCriteria::default() };
        assert!(!matches(&cnt, &size_only, &no_attributes(), FilterOperation::Or));
    }

    #[test]
    fn content_type_only_applies_to_content_instances() {
        let criteria = FilterCriteria {
            cty: vec!["text/plain:0".into(), "application/json:0".into()],
            ..FilterCriteria::default()
        };
        assert!(matches(&cin(&[]), &criteria, &no_attributes(), FilterOperation::And));
        let mut cnt = Resource::new(ResourceType::Container, "cnt1", "box", None);
        cnt.cnf = Some("text/plain:0".into());
        assert!(!matches(&cnt, &criteria, &no_attributes(), FilterOperation::And));
    }

    #[test]
    fn attribute_matches_support_wildcards() {
        let resource = cin(&[]).with_attribute("con", json!("temperature=21"));
        let mut attributes = BTreeMap::new();
        attributes.insert("con".to_string(), json!("temp*=2*"));
        attributes.insert("cs".to_string(), json!(12));
        assert!(matches(&resource, &FilterCriteria::default(), &attributes, FilterOperation::And));

        attributes.insert("rn".to_string(), json!("other"));
        assert!(!matches(&resource, &FilterCriteria::default(), &attributes, FilterOperation::And));
        assert!(matches(&resource, &FilterCriteria::default(), &attributes, FilterOperation::Or));
    }

    #[test]
    fn wildcard_semantics() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*c", "abbbc"));
        assert!(wildcard_match("a*", "a"));
        assert!(!wildcard_match("a*c", "abd"));
        assert!(!wildcard_match("abc", "abcd"));
        assert!(wildcard_match("*b*", "abc"));
    }
}
