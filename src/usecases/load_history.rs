//! Lazy history population for a conversation.
//!
//! The first visit to a conversation fetches its history through a
//! collaborator and replaces the cache entry; later visits are served from
//! the cache without another fetch. A failed fetch leaves prior cache
//! contents untouched.

use crate::domain::{message::Message, message_cache::MessageCache};

const DEFAULT_HISTORY_PAGE_SIZE: usize = 50;
const MAX_HISTORY_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadHistoryQuery {
    pub chat_id: String,
    pub limit: usize,
}

impl LoadHistoryQuery {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            limit: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }

    fn normalized_limit(&self) -> usize {
        match self.limit {
            0 => DEFAULT_HISTORY_PAGE_SIZE,
            value if value > MAX_HISTORY_PAGE_SIZE => MAX_HISTORY_PAGE_SIZE,
            value => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadHistoryOutcome {
    /// True when the cache already held the conversation and no fetch ran.
    pub from_cache: bool,
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySourceError {
    Unauthorized,
    Unavailable,
    InvalidData,
    ChatNotFound,
}

pub trait HistorySource {
    fn list_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, HistorySourceError>;
}

impl<T> HistorySource for &T
where
    T: HistorySource + ?Sized,
{
    fn list_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, HistorySourceError> {
        (*self).list_messages(chat_id, limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadHistoryError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
    ChatNotFound,
}

pub fn load_history(
    source: &dyn HistorySource,
    cache: &mut MessageCache,
    query: LoadHistoryQuery,
) -> Result<LoadHistoryOutcome, LoadHistoryError> {
    if cache.contains(&query.chat_id) {
        return Ok(LoadHistoryOutcome {
            from_cache: true,
            message_count: cache.get(&query.chat_id).len(),
        });
    }

    refetch_history(source, cache, query)
}

/// Fetches unconditionally, bypassing the cache-hit check. Used to replay a
/// resync after a connection reopens, covering any delivery gap.
pub fn refetch_history(
    source: &dyn HistorySource,
    cache: &mut MessageCache,
    query: LoadHistoryQuery,
) -> Result<LoadHistoryOutcome, LoadHistoryError> {
    let limit = query.normalized_limit();
    let messages = source
        .list_messages(&query.chat_id, limit)
        .map_err(map_source_error)?;
    let message_count = messages.len();
    cache.replace_all(&query.chat_id, messages);

    Ok(LoadHistoryOutcome {
        from_cache: false,
        message_count,
    })
}

fn map_source_error(error: HistorySourceError) -> LoadHistoryError {
    match error {
        HistorySourceError::Unauthorized => LoadHistoryError::Unauthorized,
        HistorySourceError::Unavailable => LoadHistoryError::TemporarilyUnavailable,
        HistorySourceError::InvalidData => LoadHistoryError::DataContractViolation,
        HistorySourceError::ChatNotFound => LoadHistoryError::ChatNotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::MessageContent;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    struct StubSource {
        result: Result<Vec<Message>, HistorySourceError>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl StubSource {
        fn with_result(result: Result<Vec<Message>, HistorySourceError>) -> Self {
            Self {
                result,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl HistorySource for StubSource {
        fn list_messages(
            &self,
            chat_id: &str,
            limit: usize,
        ) -> Result<Vec<Message>, HistorySourceError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((chat_id.to_owned(), limit));
            self.result.clone()
        }
    }

    fn message(id: &str, created_at_millis: i64) -> Message {
        Message {
            id: id.to_owned(),
            chat_id: "c1".to_owned(),
            sender_id: "u1".to_owned(),
            content: MessageContent::Text {
                text: "hello".to_owned(),
            },
            read_by: vec![],
            created_at: Utc.timestamp_millis_opt(created_at_millis).unwrap(),
        }
    }

    #[test]
    fn first_load_fetches_and_populates_cache() {
        let source = StubSource::with_result(Ok(vec![message("m2", 2_000), message("m1", 1_000)]));
        let mut cache = MessageCache::new();

        let outcome = load_history(&source, &mut cache, LoadHistoryQuery::new("c1"))
            .expect("load should succeed");

        assert!(!outcome.from_cache);
        assert_eq!(outcome.message_count, 2);
        assert_eq!(cache.get("c1")[0].id, "m1");
        assert_eq!(cache.get("c1")[1].id, "m2");
    }

    #[test]
    fn second_load_is_served_from_cache_without_fetch() {
        let source = StubSource::with_result(Ok(vec![message("m1", 1_000)]));
        let mut cache = MessageCache::new();

        load_history(&source, &mut cache, LoadHistoryQuery::new("c1")).expect("first load");
        let outcome = load_history(&source, &mut cache, LoadHistoryQuery::new("c1"))
            .expect("second load should succeed");

        assert!(outcome.from_cache);
        assert_eq!(source.calls.lock().expect("calls lock").len(), 1);
    }

    #[test]
    fn failed_fetch_leaves_cache_untouched() {
        let source = StubSource::with_result(Err(HistorySourceError::Unavailable));
        let mut cache = MessageCache::new();
        cache.merge("c2", message("live", 5_000));
        let snapshot = cache.clone();

        let error = load_history(&source, &mut cache, LoadHistoryQuery::new("c1"))
            .expect_err("must fail");

        assert_eq!(error, LoadHistoryError::TemporarilyUnavailable);
        assert_eq!(cache, snapshot);
    }

    #[test]
    fn uses_default_limit_when_query_limit_is_zero() {
        let source = StubSource::with_result(Ok(vec![]));
        let mut cache = MessageCache::new();

        load_history(
            &source,
            &mut cache,
            LoadHistoryQuery {
                chat_id: "c1".to_owned(),
                limit: 0,
            },
        )
        .expect("load should succeed");

        assert_eq!(
            source.calls.lock().expect("calls lock").as_slice(),
            &[("c1".to_owned(), 50)]
        );
    }

    #[test]
    fn caps_limit_to_maximum_boundary() {
        let source = StubSource::with_result(Ok(vec![]));
        let mut cache = MessageCache::new();

        load_history(
            &source,
            &mut cache,
            LoadHistoryQuery {
                chat_id: "c1".to_owned(),
                limit: 999,
            },
        )
        .expect("load should succeed");

        assert_eq!(
            source.calls.lock().expect("calls lock").as_slice(),
            &[("c1".to_owned(), 200)]
        );
    }

    #[test]
    fn maps_unauthorized_error() {
        let source = StubSource::with_result(Err(HistorySourceError::Unauthorized));
        let mut cache = MessageCache::new();

        let error = load_history(&source, &mut cache, LoadHistoryQuery::new("c1"))
            .expect_err("must fail");

        assert_eq!(error, LoadHistoryError::Unauthorized);
    }

    #[test]
    fn maps_chat_not_found_error() {
        let source = StubSource::with_result(Err(HistorySourceError::ChatNotFound));
        let mut cache = MessageCache::new();

        let error = load_history(&source, &mut cache, LoadHistoryQuery::new("c1"))
            .expect_err("must fail");

        assert_eq!(error, LoadHistoryError::ChatNotFound);
    }

    #[test]
    fn maps_invalid_data_to_contract_violation() {
        let source = StubSource::with_result(Err(HistorySourceError::InvalidData));
        let mut cache = MessageCache::new();

        let error = load_history(&source, &mut cache, LoadHistoryQuery::new("c1"))
            .expect_err("must fail");

        assert_eq!(error, LoadHistoryError::DataContractViolation);
    }
}
