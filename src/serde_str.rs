use std::{fmt::Display, ops::Deref, str::FromStr};

/// Carries a `FromStr`/`Display` type through serde as a plain string
#[derive(Clone, Debug)]
pub(crate) struct Serde<T> {
    inner: T,
}

impl<T> Serde<T> {
    pub(crate) fn new(inner: T) -> Self {
        Serde { inner }
    }
}

impl<T> Deref for Serde<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> FromStr for Serde<T>
where
    T: FromStr,
{
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Serde::new)
    }
}

impl<T> serde::Serialize for Serde<T>
where
    T: Display,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.inner)
    }
}

impl<'de, T> serde::Deserialize<'de> for Serde<T>
where
    T: FromStr,
    T::Err: Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = serde::Deserialize::deserialize(deserializer)?;

        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::Serde;
    use crate::config::Targets;

    #[test]
    fn targets_round_trip_as_string() {
        let targets: Serde<Targets> = "warn,rawvault=debug".parse().expect("Parsed targets");

        let json = serde_json::to_string(&targets).expect("Serialized");
        let parsed: Serde<Targets> = serde_json::from_str(&json).expect("Deserialized");

        assert_eq!(parsed.to_string(), targets.to_string());
        assert!(json.contains("rawvault=debug"));
    }
}
