use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A millisecond timestamp, kept as the exact JSON number it was submitted as.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct Timestamp(Number);

impl Timestamp {
    pub fn millis(&self) -> Option<i64> {
        self.0.as_i64().or_else(|| {
            self.0
                .as_f64()
                .filter(|millis| millis.is_finite())
                .map(|millis| millis.trunc() as i64)
        })
    }

    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self.0.as_i64(), other.0.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => {
                let a = self.0.as_f64().unwrap_or_default();
                let b = other.0.as_f64().unwrap_or_default();
                a.total_cmp(&b)
            }
        }
    }
}

impl From<Number> for Timestamp {
    fn from(value: Number) -> Self {
        Timestamp(value)
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Timestamp(Number::from(value))
    }
}

/// The fields a client submits to create a post.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub date_created: Timestamp,
    pub date_modified: Timestamp,
    pub content: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Post {
    #[serde(flatten)]
    pub draft: PostDraft,
    pub id: String,
}

/// Posts keyed by id.
pub type Posts = IndexMap<String, Post>;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Deserialize, Debug)]
pub struct DeleteQuery {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_serializes_flat_with_id_last() {
        let post = Post {
            draft: PostDraft {
                slug: "hello-world".into(),
                title: "Hello".into(),
                description: "d".into(),
                date_created: Timestamp::from(1000_i64),
                date_modified: Timestamp::from(1000_i64),
                content: "# hi".into(),
            },
            id: "abc".into(),
        };

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(
            value,
            json!({
                "slug": "hello-world",
                "title": "Hello",
                "description": "d",
                "dateCreated": 1000,
                "dateModified": 1000,
                "content": "# hi",
                "id": "abc",
            })
        );
        assert_eq!(
            serde_json::to_string(&post).unwrap(),
            r##"{"slug":"hello-world","title":"Hello","description":"d","dateCreated":1000,"dateModified":1000,"content":"# hi","id":"abc"}"##
        );
    }

    #[test]
    fn fractional_timestamps_keep_their_value() {
        let ts: Timestamp = serde_json::from_str("1500.75").unwrap();
        assert_eq!(ts.millis(), Some(1500));
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1500.75");
        assert_eq!(ts.total_cmp(&Timestamp::from(1500_i64)), Ordering::Greater);
        assert_eq!(
            Timestamp::from(-3_i64).total_cmp(&Timestamp::from(2_i64)),
            Ordering::Less
        );
    }
}
