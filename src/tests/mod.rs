use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

pub fn date(s: &str) -> DateTime<Utc> {
    crate::records::parse_date(s).unwrap()
}

pub fn test_deserialize_ok<T>(tests: Vec<(&str, T)>)
where
    T: Debug + PartialEq + DeserializeOwned,
{
    for (s, value) in tests {
        let v: T = serde_json::from_str(s).unwrap();
        assert_eq!(v, value);
    }
}
