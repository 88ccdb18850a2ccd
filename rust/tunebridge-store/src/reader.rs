use crate::{
    QueryResult, ReadTransaction, Reporter, Shard, ShardCursor, StoreLayout, SyncToken,
    TrackConnection, TrackDatabase, TrackStoreError, TracingReporter,
};

/// Reads the page's sharded track cache out of a [TrackDatabase].
///
/// Every call to [ShardedStoreReader::query] opens the database afresh, reads
/// inside a single read-only transaction and releases the connection when it
/// is done. Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct ShardedStoreReader<Db, R = TracingReporter> {
    database: Db,
    layout: StoreLayout,
    reporter: R,
}

impl<Db> ShardedStoreReader<Db, TracingReporter>
where
    Db: TrackDatabase,
{
    /// Creates a reader over `database` with the default [StoreLayout],
    /// reporting failures through `tracing`.
    pub fn new(database: Db) -> Self {
        Self {
            database,
            layout: StoreLayout::default(),
            reporter: TracingReporter,
        }
    }
}

impl<Db, R> ShardedStoreReader<Db, R>
where
    Db: TrackDatabase,
    R: Reporter,
{
    /// Replaces the layout used to locate the cache.
    pub fn with_layout(mut self, layout: StoreLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Replaces the sink that absorbed failures are handed to.
    pub fn with_reporter<Other>(self, reporter: Other) -> ShardedStoreReader<Db, Other>
    where
        Other: Reporter,
    {
        ShardedStoreReader {
            database: self.database,
            layout: self.layout,
            reporter,
        }
    }

    /// The layout this reader looks for.
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Reads every track the page has cached for `user_id`, together with
    /// the sync token that was current when they were written.
    ///
    /// Resolves to `None` when there is nothing to read: no user is known
    /// yet, the database cannot be opened, its stores do not exist, or the
    /// traversal fails part way. A partially read collection is never
    /// returned. Every such failure is handed to the reporter first.
    pub async fn query(&self, user_id: Option<&str>) -> Option<QueryResult> {
        match self.read(user_id).await {
            Ok(result) => Some(result),
            Err(error) => {
                self.reporter.report(&error);
                None
            }
        }
    }

    async fn read(&self, user_id: Option<&str>) -> Result<QueryResult, TrackStoreError> {
        let user_id = user_id.ok_or(TrackStoreError::UnknownUser)?;
        let name = self.layout.database_name(user_id);

        tracing::debug!(database = %name, "reading local tracks");

        let connection = self.database.open(&name, self.layout.version).await?;
        let transaction = connection.read_only(&[
            self.layout.tracks_store.as_str(),
            self.layout.info_store.as_str(),
        ])?;

        // Both requests are issued before either is awaited so that they
        // share the transaction's snapshot.
        let mut cursor = transaction.open_cursor(&self.layout.tracks_store)?;

        let timestamp = match transaction
            .get(&self.layout.info_store, &self.layout.sync_token_key)
            .await
        {
            Ok(token) => token.map(SyncToken::from),
            Err(error) => {
                self.reporter.report(&error);
                None
            }
        };

        let mut tracks = Vec::new();
        let mut shards = 0usize;

        while let Some(encoded) = cursor.next().await? {
            let shard = Shard::parse(&encoded)?;
            tracks.extend(shard.into_tracks());
            shards += 1;
        }

        tracing::debug!(
            database = %name,
            shards,
            tracks = tracks.len(),
            "read local tracks"
        );

        Ok(QueryResult { timestamp, tracks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fault, FlakyTrackDatabase, MemoryTrackDatabase, RecordingReporter, TrackRecord};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use testresult::TestResult;

    #[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
    use wasm_bindgen_test::wasm_bindgen_test;

    const USER: &str = "1234";

    fn seeded(token: Option<&str>, shards: &[&str]) -> MemoryTrackDatabase {
        let database = MemoryTrackDatabase::default();
        let layout = StoreLayout::default();
        let name = layout.database_name(USER);

        database.create(&name, layout.version, &["tracks", "info"]);
        if let Some(token) = token {
            database.put(&name, "info", "sync_token", json!(token));
        }
        for (index, shard) in shards.iter().enumerate() {
            database.put(&name, "tracks", &format!("{index:04}"), json!(shard));
        }

        database
    }

    fn ids(result: &QueryResult) -> Vec<Value> {
        result
            .tracks
            .iter()
            .map(|track| track.as_json()["id"].clone())
            .collect()
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_flattens_shards_in_cursor_then_entry_order() -> TestResult {
        let database = seeded(
            Some("tok123"),
            &[r#"{"a":{"id":1}}"#, r#"{"b":{"id":2},"c":{"id":3}}"#],
        );
        let reader = ShardedStoreReader::new(database);

        let result = reader.query(Some(USER)).await;

        assert_eq!(
            result,
            Some(QueryResult {
                timestamp: Some(SyncToken::from(json!("tok123"))),
                tracks: vec![
                    TrackRecord::from(json!({"id": 1})),
                    TrackRecord::from(json!({"id": 2})),
                    TrackRecord::from(json!({"id": 3})),
                ],
            })
        );

        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_flattens_array_shards_alongside_object_shards() -> TestResult {
        let database = seeded(
            Some("tok123"),
            &[r#"{"a":{"id":1}}"#, r#"[{"id":2},{"id":3}]"#, "7", r#"{"d":{"id":4}}"#],
        );
        let reader = ShardedStoreReader::new(database);

        let result = reader.query(Some(USER)).await.ok_or("query failed")?;

        assert_eq!(ids(&result), vec![json!(1), json!(2), json!(3), json!(4)]);

        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_yields_the_same_tracks_whatever_the_shard_order() -> TestResult {
        let shards = [
            r#"{"a":{"id":1},"b":{"id":2}}"#,
            r#"{"c":{"id":3}}"#,
            r#"{"d":{"id":4},"e":{"id":5},"f":{"id":6}}"#,
        ];
        let reversed: Vec<&str> = shards.iter().rev().copied().collect();

        let forward = ShardedStoreReader::new(seeded(None, &shards))
            .query(Some(USER))
            .await
            .ok_or("forward query failed")?;
        let backward = ShardedStoreReader::new(seeded(None, &reversed))
            .query(Some(USER))
            .await
            .ok_or("backward query failed")?;

        let mut forward_ids: Vec<String> = ids(&forward).iter().map(Value::to_string).collect();
        let mut backward_ids: Vec<String> =
            ids(&backward).iter().map(Value::to_string).collect();
        forward_ids.sort();
        backward_ids.sort();

        assert_eq!(forward_ids.len(), 6);
        assert_eq!(forward_ids, backward_ids);

        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_resolves_a_missing_token_to_none() -> TestResult {
        let reader = ShardedStoreReader::new(seeded(None, &[r#"{"a":{"id":1}}"#]));

        let result = reader.query(Some(USER)).await.ok_or("query failed")?;

        assert_eq!(result.timestamp, None);
        assert_eq!(ids(&result), vec![json!(1)]);

        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_resolves_to_none_when_the_database_cannot_be_opened() {
        let reporter = RecordingReporter::default();
        let database = FlakyTrackDatabase::new(seeded(Some("tok"), &["{}"]), Fault::Open);
        let reader = ShardedStoreReader::new(database).with_reporter(reporter.clone());

        assert_eq!(reader.query(Some(USER)).await, None);
        assert!(matches!(
            reporter.reports().as_slice(),
            [TrackStoreError::Open { .. }]
        ));
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_resolves_to_none_when_opened_below_the_page_version() {
        let database = MemoryTrackDatabase::default();
        let layout = StoreLayout::default();
        database.create(&layout.database_name(USER), layout.version + 1, &["tracks", "info"]);
        let reporter = RecordingReporter::default();
        let reader = ShardedStoreReader::new(database).with_reporter(reporter.clone());

        assert_eq!(reader.query(Some(USER)).await, None);
        assert_eq!(reporter.reports().len(), 1);
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_resolves_to_none_on_a_fresh_install() {
        let database = MemoryTrackDatabase::default();
        let reporter = RecordingReporter::default();
        let reader = ShardedStoreReader::new(database.clone()).with_reporter(reporter.clone());

        assert_eq!(reader.query(Some(USER)).await, None);
        assert!(matches!(
            reporter.reports().as_slice(),
            [TrackStoreError::Transaction(_)]
        ));
        assert_eq!(database.store_names("music_1234"), Some(vec![]));
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_never_leaks_shards_read_before_a_cursor_failure() {
        let database = FlakyTrackDatabase::new(
            seeded(
                Some("tok"),
                &[r#"{"a":{"id":1}}"#, r#"{"b":{"id":2}}"#, r#"{"c":{"id":3}}"#],
            ),
            Fault::CursorAfter(2),
        );
        let reporter = RecordingReporter::default();
        let reader = ShardedStoreReader::new(database).with_reporter(reporter.clone());

        assert_eq!(reader.query(Some(USER)).await, None);
        assert!(matches!(
            reporter.reports().as_slice(),
            [TrackStoreError::Cursor(_)]
        ));
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_resolves_to_none_on_a_malformed_shard() {
        let reporter = RecordingReporter::default();
        let reader = ShardedStoreReader::new(seeded(None, &[r#"{"a":{"id":1}}"#, "not json"]))
            .with_reporter(reporter.clone());

        assert_eq!(reader.query(Some(USER)).await, None);
        assert!(matches!(
            reporter.reports().as_slice(),
            [TrackStoreError::Shard(_)]
        ));
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_keeps_the_tracks_when_only_the_token_read_fails() -> TestResult {
        let database = FlakyTrackDatabase::new(
            seeded(Some("tok"), &[r#"{"a":{"id":1}}"#]),
            Fault::Read,
        );
        let reporter = RecordingReporter::default();
        let reader = ShardedStoreReader::new(database).with_reporter(reporter.clone());

        let result = reader.query(Some(USER)).await.ok_or("query failed")?;

        assert_eq!(result.timestamp, None);
        assert_eq!(ids(&result), vec![json!(1)]);
        assert!(matches!(
            reporter.reports().as_slice(),
            [TrackStoreError::Read(_)]
        ));

        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_reads_token_and_tracks_from_one_snapshot() -> TestResult {
        let inner = seeded(Some("old"), &[r#"{"a":{"id":1}}"#, r#"{"b":{"id":2}}"#]);
        let name = StoreLayout::default().database_name(USER);
        let writer = inner.clone();

        let database = FlakyTrackDatabase::new(inner, Fault::None).on_cursor_step(move || {
            writer.put(&name, "info", "sync_token", json!("new"));
            writer.put(&name, "tracks", "9999", json!(r#"{"z":{"id":99}}"#));
            writer.delete(&name, "tracks", "0000");
        });
        let reader = ShardedStoreReader::new(database);

        let result = reader.query(Some(USER)).await.ok_or("query failed")?;

        assert_eq!(result.timestamp, Some(SyncToken::from(json!("old"))));
        assert_eq!(ids(&result), vec![json!(1), json!(2)]);

        Ok(())
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_does_not_open_anything_before_a_user_is_known() {
        let database = MemoryTrackDatabase::default();
        let reporter = RecordingReporter::default();
        let reader = ShardedStoreReader::new(database.clone()).with_reporter(reporter.clone());

        assert_eq!(reader.query(None).await, None);
        assert_eq!(reporter.reports(), vec![TrackStoreError::UnknownUser]);
        assert_eq!(database.version("music_undefined"), None);
    }

    #[cfg_attr(all(target_arch = "wasm32", target_os = "unknown"), wasm_bindgen_test)]
    #[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
    async fn it_honors_a_custom_layout() -> TestResult {
        let layout = StoreLayout {
            prefix: "library-".to_string(),
            tracks_store: "shards".to_string(),
            ..StoreLayout::default()
        };
        let database = MemoryTrackDatabase::default();
        database.create("library-7", layout.version, &["shards", "info"]);
        database.put("library-7", "shards", "0", json!(r#"{"a":{"id":1}}"#));

        let reader = ShardedStoreReader::new(database).with_layout(layout);
        let result = reader.query(Some("7")).await.ok_or("query failed")?;

        assert_eq!(ids(&result), vec![json!(1)]);

        Ok(())
    }
}
