//! bind::tokens
//!
//! Token bucket partitioning, the first step of every bind.
//!
//! A token is keyed (`key=value`), keyless (no `=`), or malformed (empty
//! key or value, or more than one `=`). Malformed tokens are dropped and
//! reported, never guessed at. With null input enabled, a keyed token whose
//! value spells `null` in any case moves to a separate bucket that binds
//! the explicit-null sentinel instead of a parsed value.

/// A well-formed `key=value` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyedToken {
    pub key: String,
    pub value: String,
    /// The original token text, for reporting.
    pub raw: String,
}

/// The partitioned input of one bind.
#[derive(Debug, Default)]
pub(crate) struct TokenBuckets {
    pub keyed: Vec<KeyedToken>,
    pub keyless: Vec<String>,
    pub nulls: Vec<KeyedToken>,
    pub malformed: Vec<String>,
}

/// Partition raw tokens, preserving input order within each bucket.
pub(crate) fn partition(tokens: &[String], allow_null: bool) -> TokenBuckets {
    let mut buckets = TokenBuckets::default();

    for token in tokens {
        if !token.contains('=') {
            buckets.keyless.push(token.clone());
            continue;
        }
        if token.matches('=').count() > 1 {
            buckets.malformed.push(token.clone());
            continue;
        }
        let (key, value) = match token.split_once('=') {
            Some(parts) => parts,
            None => continue,
        };
        if key.is_empty() || value.is_empty() {
            buckets.malformed.push(token.clone());
            continue;
        }
        let keyed = KeyedToken {
            key: key.to_string(),
            value: value.to_string(),
            raw: token.clone(),
        };
        if allow_null && value.eq_ignore_ascii_case("null") {
            buckets.nulls.push(keyed);
        } else {
            buckets.keyed.push(keyed);
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn three_way_split() {
        let buckets = partition(
            &toks(&["amount=5", "hello", "=5", "x=", "a=b=c", "world"]),
            false,
        );
        assert_eq!(buckets.keyed.len(), 1);
        assert_eq!(buckets.keyed[0].key, "amount");
        assert_eq!(buckets.keyed[0].value, "5");
        assert_eq!(buckets.keyless, ["hello", "world"]);
        assert_eq!(buckets.malformed, ["=5", "x=", "a=b=c"]);
        assert!(buckets.nulls.is_empty());
    }

    #[test]
    fn null_bucket_only_when_enabled() {
        let off = partition(&toks(&["target=null"]), false);
        assert_eq!(off.keyed.len(), 1);
        assert!(off.nulls.is_empty());

        let on = partition(&toks(&["target=null", "other=NULL", "n=5"]), true);
        assert_eq!(on.nulls.len(), 2);
        assert_eq!(on.nulls[0].key, "target");
        assert_eq!(on.keyed.len(), 1);
        assert_eq!(on.keyed[0].key, "n");
    }

    #[test]
    fn keyless_null_stays_keyless() {
        let buckets = partition(&toks(&["null"]), true);
        assert_eq!(buckets.keyless, ["null"]);
        assert!(buckets.nulls.is_empty());
    }

    #[test]
    fn raw_text_preserved_for_reporting() {
        let buckets = partition(&toks(&["Name=Ada"]), false);
        assert_eq!(buckets.keyed[0].raw, "Name=Ada");
        assert_eq!(buckets.keyed[0].key, "Name");
        assert_eq!(buckets.keyed[0].value, "Ada");
    }
}
