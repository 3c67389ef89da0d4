use anyhow::Error;
use log::debug;
use stack_string::{format_sstr, StackString};
use time::{macros::format_description, OffsetDateTime};

use crate::{error::BackupError, storage::ContainerStore};

/// Longest container name blob storage accepts.
pub const MAX_CONTAINER_NAME_LENGTH: usize = 63;

/// `<YYYYMMDD-HHMM>-backup-<disambiguator><source_name>`
#[must_use]
pub fn generate(source_name: &str, disambiguator: &str, timestamp: &OffsetDateTime) -> StackString {
    let format = format_description!("[year][month][day]-[hour][minute]");
    let prefix = match timestamp.format(format) {
        Ok(t) => t,
        Err(_) => unreachable!(),
    };
    format_sstr!("{prefix}-backup-{disambiguator}{source_name}")
}

/// First `max_length` characters of `name`.
#[must_use]
pub fn shorten(name: &str, max_length: usize) -> StackString {
    match name.char_indices().nth(max_length) {
        Some((idx, _)) => name[..idx].into(),
        None => name.into(),
    }
}

fn disambiguator(attempt: usize) -> StackString {
    format_sstr!("-{attempt}-")
}

/// Find a destination name for `source_name` that doesn't exist in `store`.
///
/// The plain name is tried first, then `-0-`, `-1-`, ... disambiguated
/// names up to `max_attempts` of them. Errors from the existence check are
/// returned as is.
///
/// # Errors
/// Return error if the existence check fails or every candidate is taken
pub async fn resolve_unique_name<S>(
    store: &S,
    source_name: &str,
    timestamp: &OffsetDateTime,
    max_attempts: usize,
) -> Result<StackString, Error>
where
    S: ContainerStore + ?Sized,
{
    let candidate = shorten(
        generate(source_name, "", timestamp).as_str(),
        MAX_CONTAINER_NAME_LENGTH,
    );
    if !store.container_exists(candidate.as_str()).await? {
        return Ok(candidate);
    }
    debug!("{candidate} already exists");
    for attempt in 0..max_attempts {
        let candidate = shorten(
            generate(source_name, &disambiguator(attempt), timestamp).as_str(),
            MAX_CONTAINER_NAME_LENGTH,
        );
        if !store.container_exists(candidate.as_str()).await? {
            return Ok(candidate);
        }
        debug!("{candidate} already exists");
    }
    Err(BackupError::NamingExhausted {
        source_name: source_name.into(),
        attempts: max_attempts + 1,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use anyhow::{format_err, Error};
    use async_trait::async_trait;
    use maplit::hashset;
    use parking_lot::Mutex;
    use stack_string::{format_sstr, StackString};
    use std::collections::HashSet;
    use time::macros::datetime;

    use crate::{
        error::BackupError,
        naming::{generate, resolve_unique_name, shorten, MAX_CONTAINER_NAME_LENGTH},
        storage::ContainerStore,
    };

    struct FixedSet {
        existing: HashSet<StackString>,
        checks: Mutex<Vec<StackString>>,
    }

    impl FixedSet {
        fn new(existing: HashSet<StackString>) -> Self {
            Self {
                existing,
                checks: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ContainerStore for FixedSet {
        async fn container_exists(&self, name: &str) -> Result<bool, Error> {
            self.checks.lock().push(name.into());
            Ok(self.existing.iter().any(|n| n.as_str() == name))
        }

        async fn create_container(&self, name: &str) -> Result<(), Error> {
            Err(format_err!("unexpected create of {name}"))
        }
    }

    struct Unreachable;

    #[async_trait]
    impl ContainerStore for Unreachable {
        async fn container_exists(&self, _: &str) -> Result<bool, Error> {
            Err(format_err!("connection refused"))
        }

        async fn create_container(&self, _: &str) -> Result<(), Error> {
            Err(format_err!("connection refused"))
        }
    }

    #[test]
    fn test_generate() {
        let ts = datetime!(2023-03-01 14:05 UTC);
        assert_eq!(generate("logs", "", &ts).as_str(), "20230301-1405-backup-logs");
        assert_eq!(
            generate("logs", "-3-", &ts).as_str(),
            "20230301-1405-backup--3-logs"
        );
        assert_eq!(generate("logs", "-3-", &ts), generate("logs", "-3-", &ts));

        let ts = datetime!(2024-12-09 03:00:59 UTC);
        assert_eq!(generate("x", "", &ts).as_str(), "20241209-0300-backup-x");
    }

    #[test]
    fn test_shorten() {
        let ts = datetime!(2023-03-01 14:05 UTC);
        let name = generate("logs", "", &ts);
        assert_eq!(shorten(name.as_str(), 10).as_str(), "20230301-1");
        assert_eq!(shorten(name.as_str(), MAX_CONTAINER_NAME_LENGTH), name);
        assert_eq!(shorten("", 10).as_str(), "");
        assert_eq!(shorten("abc", 0).as_str(), "");

        let long = "a".repeat(100);
        for n in [0, 1, 62, 63, 64, 100, 200] {
            let short = shorten(&long, n);
            assert_eq!(short.as_str().len(), n.min(long.len()));
            assert!(long.starts_with(short.as_str()));
        }
    }

    #[tokio::test]
    async fn test_resolve_no_collision() -> Result<(), Error> {
        let ts = datetime!(2023-03-01 14:05 UTC);
        let store = FixedSet::new(HashSet::new());
        let name = resolve_unique_name(&store, "logs", &ts, 10).await?;
        assert_eq!(name.as_str(), "20230301-1405-backup-logs");
        assert_eq!(store.checks.lock().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_first_retry() -> Result<(), Error> {
        let ts = datetime!(2023-03-01 14:05 UTC);
        let store = FixedSet::new(hashset! {"20230301-1405-backup-logs".into()});
        let name = resolve_unique_name(&store, "logs", &ts, 10).await?;
        assert_eq!(name.as_str(), "20230301-1405-backup--0-logs");
        assert_eq!(store.checks.lock().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_within_bound() -> Result<(), Error> {
        let ts = datetime!(2023-03-01 14:05 UTC);
        let mut existing: HashSet<StackString> = (0..5)
            .map(|i| format_sstr!("20230301-1405-backup--{i}-logs"))
            .collect();
        existing.insert("20230301-1405-backup-logs".into());
        let store = FixedSet::new(existing.clone());
        let name = resolve_unique_name(&store, "logs", &ts, 100).await?;
        assert_eq!(name.as_str(), "20230301-1405-backup--5-logs");
        assert!(!existing.contains(&name));
        assert!(store.checks.lock().len() <= existing.len() + 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_truncated_names() -> Result<(), Error> {
        let ts = datetime!(2023-03-01 14:05 UTC);
        let source = "c".repeat(60);
        let plain = shorten(generate(&source, "", &ts).as_str(), MAX_CONTAINER_NAME_LENGTH);
        let store = FixedSet::new(hashset! {plain.clone()});
        let name = resolve_unique_name(&store, &source, &ts, 10).await?;
        assert_eq!(name.as_str().len(), MAX_CONTAINER_NAME_LENGTH);
        assert_ne!(name, plain);
        assert!(name.as_str().starts_with("20230301-1405-backup--0-"));
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_exhausted() {
        let ts = datetime!(2023-03-01 14:05 UTC);
        let store = FixedSet::new(hashset! {
            "20230301-1405-backup-logs".into(),
            "20230301-1405-backup--0-logs".into(),
            "20230301-1405-backup--1-logs".into(),
        });
        let err = resolve_unique_name(&store, "logs", &ts, 2).await.unwrap_err();
        match err.downcast_ref::<BackupError>() {
            Some(BackupError::NamingExhausted { attempts, .. }) => assert_eq!(*attempts, 3),
            _ => panic!("unexpected error {err}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_check_failure() {
        let ts = datetime!(2023-03-01 14:05 UTC);
        let result = resolve_unique_name(&Unreachable, "logs", &ts, 2).await;
        assert!(result.is_err());
    }
}
