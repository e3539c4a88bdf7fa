pub mod auth;
pub mod friends;
pub mod index;
pub mod restaurants;

use crate::ChowError;
use std::collections::HashMap;

pub type Params = HashMap<String, String>;

/// Pull the named parameters out of a query or form map.
///
/// Every name that is absent or empty is reported at once.
pub(crate) fn required<'a, const N: usize>(
    params: &'a Params,
    names: [&str; N],
) -> Result<[&'a str; N], ChowError> {
    let missing: Vec<String> = names
        .into_iter()
        .filter(|name| params.get(*name).is_none_or(|v| v.is_empty()))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ChowError::RequiredFields(missing));
    }
    Ok(names.map(|name| params.get(name).map(String::as_str).unwrap_or_default()))
}

/// Optional numeric parameter; unparsable values fall back to `default`.
pub(crate) fn number_or(params: &Params, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn required_reports_every_missing_or_empty_field() {
        let p = params(&[("user_name", ""), ("other", "x")]);
        match required(&p, ["user_name", "password"]) {
            Err(ChowError::RequiredFields(fields)) => {
                assert_eq!(fields, vec!["user_name".to_string(), "password".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let p = params(&[("user_name", "alice"), ("password", "pw")]);
        let [name, pw] = required(&p, ["user_name", "password"]).unwrap();
        assert_eq!((name, pw), ("alice", "pw"));
    }

    #[test]
    fn numbers_fall_back_on_garbage() {
        let p = params(&[("start", "4"), ("count", "lots")]);
        assert_eq!(number_or(&p, "start", 0), 4);
        assert_eq!(number_or(&p, "count", 2), 2);
        assert_eq!(number_or(&p, "missing", 7), 7);
    }
}
