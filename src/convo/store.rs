use crate::convo::identity::derived_id;
use crate::convo::index::{IndexDocument, IndexMetadata, MetadataFilter, VectorIndex};
use crate::convo::model::{InsertOutcome, MessageRecord, NewMessage, SearchHit, Sender, SkipReason};
use crate::convo::noise;
use crate::convo::timestamp::{CanonicalTimestamp, epoch_secs};
use crate::error::{ConvoError, ConvoResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Persistence and query facade over a vector index.
///
/// The index decides physical order; every listing returned from here is
/// re-sorted so callers always see sessions in conversational order.
pub struct ConversationStore<I: VectorIndex> {
    index: I,
}

enum Prepared {
    Ready(IndexDocument),
    Skip(SkipReason),
}

fn to_record(doc: IndexDocument) -> ConvoResult<MessageRecord> {
    let sender = doc.metadata.sender.parse::<Sender>()?;
    Ok(MessageRecord {
        message_id: doc.id,
        content: doc.document,
        timestamp: doc.metadata.timestamp,
        sender,
        session_key: doc.metadata.session_key,
        channel: doc.metadata.channel,
        order: doc.metadata.order,
    })
}

fn sort_conversational(records: &mut [MessageRecord]) {
    records.sort_by(|a, b| {
        a.session_key
            .cmp(&b.session_key)
            .then(a.order.cmp(&b.order))
            .then_with(|| a.message_id.cmp(&b.message_id))
    });
}

impl<I: VectorIndex> ConversationStore<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Validate `message` and resolve its id without writing anything.
    fn prepare(&self, message: NewMessage) -> ConvoResult<Prepared> {
        let content = message.content.trim();
        if content.is_empty() {
            return Err(ConvoError::EmptyContent);
        }
        let order_index =
            u64::try_from(message.order).map_err(|_| ConvoError::NegativeOrder(message.order))?;
        if noise::is_sentinel(content) {
            return Ok(Prepared::Skip(SkipReason::Noise(format!("sentinel {content}"))));
        }

        let timestamp = match message.timestamp.as_deref() {
            Some(raw) => CanonicalTimestamp::parse(raw)?,
            None => CanonicalTimestamp::now(),
        };
        let message_id = message
            .message_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| derived_id(&message.session_key, order_index));

        if !self.index.get(std::slice::from_ref(&message_id))?.is_empty() {
            return Ok(Prepared::Skip(SkipReason::Duplicate(message_id)));
        }

        Ok(Prepared::Ready(IndexDocument {
            id: message_id,
            document: content.to_string(),
            metadata: IndexMetadata {
                timestamp: timestamp.iso,
                timestamp_epoch: timestamp.epoch_secs,
                sender: message.sender.as_str().to_string(),
                session_key: message.session_key,
                channel: message.channel,
                order: message.order,
            },
        }))
    }

    /// Insert one message. A taken id is a `Skipped(Duplicate)` outcome and
    /// leaves the stored record untouched; backend failures are errors.
    pub fn insert(&mut self, message: NewMessage) -> ConvoResult<InsertOutcome> {
        match self.prepare(message)? {
            Prepared::Ready(doc) => {
                let message_id = doc.id.clone();
                self.index.add(vec![doc])?;
                Ok(InsertOutcome::Inserted(message_id))
            }
            Prepared::Skip(reason) => Ok(InsertOutcome::Skipped(reason)),
        }
    }

    /// The outcome `insert` would have, with the store left unchanged.
    pub fn check(&self, message: NewMessage) -> ConvoResult<InsertOutcome> {
        Ok(match self.prepare(message)? {
            Prepared::Ready(doc) => InsertOutcome::Inserted(doc.id),
            Prepared::Skip(reason) => InsertOutcome::Skipped(reason),
        })
    }

    pub fn get(&self, message_id: &str) -> ConvoResult<Option<MessageRecord>> {
        let found = self.index.get(&[message_id.to_string()])?;
        found.into_iter().next().map(to_record).transpose()
    }

    pub fn delete(&mut self, message_id: &str) -> ConvoResult<bool> {
        let ids = [message_id.to_string()];
        if self.index.get(&ids)?.is_empty() {
            return Ok(false);
        }
        self.index.delete(&ids)?;
        Ok(true)
    }

    /// Similarity search; the ranking (ascending distance) is the index's.
    pub fn search(
        &self,
        query: &str,
        limit: usize,
        sender: Option<Sender>,
    ) -> ConvoResult<Vec<SearchHit>> {
        let mut filter = MetadataFilter::default();
        if let Some(sender) = sender {
            filter = filter.sender(sender.as_str());
        }
        self.index
            .query(query, limit, &filter)?
            .into_iter()
            .map(|hit| {
                Ok(SearchHit {
                    record: to_record(hit.document)?,
                    distance: hit.distance,
                })
            })
            .collect()
    }

    /// All records with `start <= timestamp <= end`, sorted by
    /// `(session_key, order)`.
    pub fn query_by_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        sender: Option<Sender>,
    ) -> ConvoResult<Vec<MessageRecord>> {
        if start > end {
            return Ok(Vec::new());
        }
        let mut filter = MetadataFilter::default().epoch_between(epoch_secs(start), epoch_secs(end));
        if let Some(sender) = sender {
            filter = filter.sender(sender.as_str());
        }
        let mut records = self
            .index
            .get_all(&filter)?
            .into_iter()
            .map(to_record)
            .collect::<ConvoResult<Vec<_>>>()?;
        sort_conversational(&mut records);
        Ok(records)
    }

    pub fn query_by_session(&self, session_key: &str) -> ConvoResult<Vec<MessageRecord>> {
        let filter = MetadataFilter::default().session(session_key);
        let mut records = self
            .index
            .get_all(&filter)?
            .into_iter()
            .map(to_record)
            .collect::<ConvoResult<Vec<_>>>()?;
        sort_conversational(&mut records);
        Ok(records)
    }

    pub fn list_sessions(&self) -> ConvoResult<Vec<String>> {
        let sessions = self
            .index
            .get_all(&MetadataFilter::default())?
            .into_iter()
            .map(|doc| doc.metadata.session_key)
            .collect::<BTreeSet<_>>();
        Ok(sessions.into_iter().collect())
    }

    pub fn count(&self) -> ConvoResult<usize> {
        self.index.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convo::index::IndexHit;
    use crate::convo::local_index::LocalIndex;
    use chrono::TimeZone;

    fn store() -> ConversationStore<LocalIndex> {
        ConversationStore::new(LocalIndex::in_memory(64))
    }

    fn msg(session: &str, order: i64, sender: Sender, text: &str, ts: &str) -> NewMessage {
        NewMessage {
            content: text.to_string(),
            sender,
            session_key: session.to_string(),
            order,
            channel: "manual".to_string(),
            timestamp: Some(ts.to_string()),
            message_id: None,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid")
    }

    #[test]
    fn insert_derives_id_and_round_trips_through_get() {
        let mut store = store();
        let out = store
            .insert(msg("s1", 3, Sender::Horse, " hello ", "2024-01-01T00:00:00Z"))
            .expect("insert");
        assert_eq!(out, InsertOutcome::Inserted("s1_000003".to_string()));

        let got = store.get("s1_000003").expect("get").expect("present");
        assert_eq!(got.content, "hello");
        assert_eq!(got.sender, Sender::Horse);
        assert_eq!(got.timestamp, "2024-01-01T00:00:00.000Z");
        assert_eq!(got.order, 3);
        assert!(store.get("missing").expect("get").is_none());
    }

    #[test]
    fn duplicate_id_keeps_first_writer() {
        let mut store = store();
        let mut first = msg("s1", 0, Sender::Horse, "first", "2024-01-01T00:00:00Z");
        first.message_id = Some("om_1".into());
        let mut second = msg("s2", 5, Sender::Claw, "second", "2024-01-02T00:00:00Z");
        second.message_id = Some("om_1".into());

        store.insert(first).expect("first");
        let out = store.insert(second).expect("second");
        assert_eq!(out, InsertOutcome::Skipped(SkipReason::Duplicate("om_1".into())));
        assert_eq!(store.get("om_1").expect("get").expect("some").content, "first");
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn empty_content_and_bad_timestamps_are_validation_errors() {
        let mut store = store();
        let err = store
            .insert(msg("s1", 0, Sender::Horse, "   ", "2024-01-01T00:00:00Z"))
            .expect_err("empty");
        assert!(matches!(err, ConvoError::EmptyContent));
        let err = store
            .insert(msg("s1", 0, Sender::Horse, "hi", "not a time"))
            .expect_err("timestamp");
        assert!(err.is_validation());
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn negative_order_is_rejected_before_it_can_collide() {
        let mut store = store();
        let err = store
            .insert(msg("s", -1, Sender::Horse, "early", "2024-01-01T00:00:00Z"))
            .expect_err("negative order");
        assert!(matches!(err, ConvoError::NegativeOrder(-1)));
        assert!(err.is_validation());

        let out = store
            .insert(msg("s", 0, Sender::Horse, "first", "2024-01-01T00:00:00Z"))
            .expect("insert");
        assert_eq!(out, InsertOutcome::Inserted("s_000000".to_string()));
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn check_reports_outcome_without_writing() {
        let mut store = store();
        let fresh = msg("s1", 0, Sender::Horse, "hello", "2024-01-01T00:00:00Z");
        assert_eq!(
            store.check(fresh.clone()).expect("check"),
            InsertOutcome::Inserted("s1_000000".to_string())
        );
        assert_eq!(store.count().expect("count"), 0);

        store.insert(fresh.clone()).expect("insert");
        assert_eq!(
            store.check(fresh).expect("check"),
            InsertOutcome::Skipped(SkipReason::Duplicate("s1_000000".to_string()))
        );
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn sentinel_content_is_never_stored() {
        let mut store = store();
        let out = store
            .insert(msg("s1", 0, Sender::Claw, "NO_REPLY", "2024-01-01T00:00:00Z"))
            .expect("insert");
        assert!(matches!(out, InsertOutcome::Skipped(SkipReason::Noise(_))));
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn missing_timestamp_defaults_to_now() {
        let mut store = store();
        let before = Utc::now().timestamp();
        let mut m = msg("s1", 0, Sender::Horse, "now-ish", "");
        m.timestamp = None;
        store.insert(m).expect("insert");
        let rec = store.get("s1_000000").expect("get").expect("some");
        let stamped = crate::convo::timestamp::parse_instant(&rec.timestamp).expect("parse");
        assert!(stamped.timestamp() >= before);
    }

    #[test]
    fn delete_reports_existence() {
        let mut store = store();
        store
            .insert(msg("s1", 0, Sender::Horse, "bye", "2024-01-01T00:00:00Z"))
            .expect("insert");
        assert!(store.delete("s1_000000").expect("delete"));
        assert!(!store.delete("s1_000000").expect("delete again"));
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn time_range_is_inclusive_filtered_and_sorted() {
        let mut store = store();
        // 1704067200 = 2024-01-01T00:00:00Z
        store.insert(msg("b", 1, Sender::Claw, "b1", "2024-01-01T00:00:10Z")).expect("insert");
        store.insert(msg("a", 2, Sender::Horse, "a2", "2024-01-01T00:00:00Z")).expect("insert");
        store.insert(msg("b", 0, Sender::Horse, "b0", "2024-01-01T00:00:20Z")).expect("insert");
        store.insert(msg("a", 1, Sender::Claw, "a1", "2024-01-01T00:00:05Z")).expect("insert");
        store.insert(msg("a", 0, Sender::Horse, "late", "2024-01-01T00:01:00Z")).expect("insert");

        let got = store
            .query_by_time(at(1_704_067_200), at(1_704_067_220), None)
            .expect("query");
        let keys = got
            .iter()
            .map(|r| (r.session_key.as_str(), r.order))
            .collect::<Vec<_>>();
        assert_eq!(keys, vec![("a", 1), ("a", 2), ("b", 0), ("b", 1)]);

        let horse = store
            .query_by_time(at(1_704_067_200), at(1_704_067_220), Some(Sender::Horse))
            .expect("query");
        assert!(horse.iter().all(|r| r.sender == Sender::Horse));
        assert_eq!(horse.len(), 2);

        assert!(store
            .query_by_time(at(1_704_067_220), at(1_704_067_200), None)
            .expect("reversed")
            .is_empty());
    }

    #[test]
    fn session_query_and_listing_are_sorted() {
        let mut store = store();
        for (session, order) in [("s2", 4), ("s1", 2), ("s2", 1), ("s1", 0), ("s2", 3)] {
            store
                .insert(msg(session, order, Sender::Horse, "x", "2024-01-01T00:00:00Z"))
                .expect("insert");
        }
        let orders = store
            .query_by_session("s2")
            .expect("session")
            .iter()
            .map(|r| r.order)
            .collect::<Vec<_>>();
        assert_eq!(orders, vec![1, 3, 4]);
        assert_eq!(store.list_sessions().expect("list"), vec!["s1", "s2"]);
        assert!(store.query_by_session("nope").expect("empty").is_empty());
    }

    #[test]
    fn search_applies_sender_prefilter() {
        let mut store = store();
        store.insert(msg("s1", 0, Sender::Horse, "deploy the gateway", "2024-01-01T00:00:00Z")).expect("insert");
        store.insert(msg("s1", 1, Sender::Claw, "gateway deployed", "2024-01-01T00:00:01Z")).expect("insert");
        let hits = store.search("gateway", 10, Some(Sender::Claw)).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.sender, Sender::Claw);
        let all = store.search("gateway", 10, None).expect("search");
        assert_eq!(all.len(), 2);
        assert!(all[0].distance <= all[1].distance);
    }

    struct FailingIndex;

    impl VectorIndex for FailingIndex {
        fn add(&mut self, _: Vec<IndexDocument>) -> ConvoResult<()> {
            Err(ConvoError::Index("disk full".into()))
        }
        fn get(&self, _: &[String]) -> ConvoResult<Vec<IndexDocument>> {
            Ok(Vec::new())
        }
        fn delete(&mut self, _: &[String]) -> ConvoResult<()> {
            Ok(())
        }
        fn query(&self, _: &str, _: usize, _: &MetadataFilter) -> ConvoResult<Vec<IndexHit>> {
            Ok(Vec::new())
        }
        fn get_all(&self, _: &MetadataFilter) -> ConvoResult<Vec<IndexDocument>> {
            Ok(Vec::new())
        }
        fn count(&self) -> ConvoResult<usize> {
            Ok(0)
        }
    }

    #[test]
    fn backend_failure_is_an_error_not_a_duplicate() {
        let mut store = ConversationStore::new(FailingIndex);
        let err = store
            .insert(msg("s1", 0, Sender::Horse, "hi", "2024-01-01T00:00:00Z"))
            .expect_err("backend");
        assert!(!err.is_validation());
        assert_eq!(err.code(), "E004_INDEX_FAILURE");
    }
}
