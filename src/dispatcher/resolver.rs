//! # Identifier Resolution
//!
//! Requests address resources in several forms:
//!
//! | Form | Example | Resolves to |
//! |---|---|---|
//! | unstructured | `cnt5821` | lookup by resource id |
//! | structured | `cse-in/sensor/data` or `-/sensor/data` | lookup by path |
//! | hybrid | `cnt5821/la` | path of `cnt5821`, plus the suffix |
//! | SP-relative, own node | `/id-in/cnt5821` | prefix stripped, then as above |
//! | SP-relative, other node | `/id-mn/cnt77` | remote proxy |
//!
//! [`classify`] is the pure, storage-free part. Completing a hybrid identifier
//! needs one lookup and is done by the dispatcher. Neither step fails: an
//! identifier that cannot be resolved simply produces a target storage will not find.

/// A raw identifier, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Unstructured(String),
    Structured(String),
    /// A resource id followed by a structured remainder.
    Hybrid { ri: String, suffix: String },
    /// Belongs to another node.
    Remote(String),
}

/// The canonical target of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Id(String),
    Path(String),
    Remote(String),
}

impl Target {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Id(id) | Self::Path(id) | Self::Remote(id) => id,
        }
    }
}

pub fn classify(id: &str, cse_id: &str, cse_rn: &str) -> Identifier {
    let own = format!("/{cse_id}");
    let local = match id.strip_prefix(&own) {
        Some("") => return Identifier::Structured(cse_rn.to_string()),
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ if id.starts_with('/') => return Identifier::Remote(id.to_string()),
        _ => id,
    };

    let (head, rest) = match local.split_once('/') {
        Some((head, rest)) => (head, Some(rest)),
        None => (local, None),
    };
    if head == cse_rn {
        return Identifier::Structured(local.to_string());
    }
    if head == "-" {
        return Identifier::Structured(match rest {
            Some(rest) => format!("{cse_rn}/{rest}"),
            None => cse_rn.to_string(),
        });
    }
    match rest {
        Some(suffix) if !suffix.is_empty() => Identifier::Hybrid {
            ri: head.to_string(),
            suffix: suffix.to_string(),
        },
        _ => Identifier::Unstructured(head.to_string()),
    }
}

/// The path of the virtual resource named `segment` that `srn` addresses or
/// passes through, e.g. `cse-in/grp/fopt` for `cse-in/grp/fopt/la` and `fopt`.
pub fn virtual_head<'a>(srn: &'a str, segment: &str) -> Option<&'a str> {
    let marker = format!("/{segment}");
    if srn.ends_with(&marker) {
        return Some(srn);
    }
    let inner = format!("{marker}/");
    srn.find(&inner).map(|idx| &srn[..idx + marker.len()])
}

/// The part of an identifier after its `fopt` segment, with leading slash
/// (`"/la"`), or `""` when the fan-out point itself is addressed.
pub fn fanout_suffix(id: &str) -> &str {
    if id.ends_with("/fopt") {
        return "";
    }
    match id.find("/fopt/") {
        Some(idx) => &id[idx + "/fopt".len()..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_local(id: &str) -> Identifier {
        classify(id, "id-in", "cse-in")
    }

    #[test]
    fn classifies_every_identifier_form() {
        assert_eq!(classify_local("cnt1"), Identifier::Unstructured("cnt1".into()));
        assert_eq!(classify_local("cse-in/ae/cnt"), Identifier::Structured("cse-in/ae/cnt".into()));
        assert_eq!(classify_local("-/ae/cnt"), Identifier::Structured("cse-in/ae/cnt".into()));
        assert_eq!(
            classify_local("cnt1/la"),
            Identifier::Hybrid { ri: "cnt1".into(), suffix: "la".into() }
        );
        assert_eq!(classify_local("/id-mn/cnt1"), Identifier::Remote("/id-mn/cnt1".into()));
        assert_eq!(classify_local("//example.com/id-mn/cnt1"), Identifier::Remote("//example.com/id-mn/cnt1".into()));
    }

    #[test]
    fn strips_own_sp_relative_prefix() {
        assert_eq!(classify_local("/id-in/cnt1"), Identifier::Unstructured("cnt1".into()));
        assert_eq!(classify_local("/id-in/cse-in/ae"), Identifier::Structured("cse-in/ae".into()));
        assert_eq!(classify_local("/id-in"), Identifier::Structured("cse-in".into()));
        // Only a whole segment matches the own CSE-ID.
        assert_eq!(classify_local("/id-inx/cnt1"), Identifier::Remote("/id-inx/cnt1".into()));
    }

    #[test]
    fn finds_virtual_heads_and_fanout_suffixes() {
        assert_eq!(virtual_head("cse-in/grp/fopt", "fopt"), Some("cse-in/grp/fopt"));
        assert_eq!(virtual_head("cse-in/grp/fopt/la", "fopt"), Some("cse-in/grp/fopt"));
        assert_eq!(virtual_head("cse-in/grp/fopts", "fopt"), None);
        assert_eq!(virtual_head("cse-in/pch/pcu", "pcu"), Some("cse-in/pch/pcu"));

        assert_eq!(fanout_suffix("cse-in/grp/fopt"), "");
        assert_eq!(fanout_suffix("grp1/fopt/la"), "/la");
        assert_eq!(fanout_suffix("cse-in/grp/fopt/cnt/ol"), "/cnt/ol");
    }
}
