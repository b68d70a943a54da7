use crate::cache::MergeStats;
use crate::error::{EngineError, Result};
use crate::models::*;
use crate::store::{Filter, RecordStore};

use super::Engine;

impl<S: RecordStore> Engine<S> {
    /// Load the partition matching `filter` and merge it into the cache.
    ///
    /// Cached entities matching the filter are replaced by the fetched set,
    /// so rows deleted elsewhere disappear; everything outside the partition
    /// stays as it was. Rows that fail to decode are skipped.
    pub async fn fetch<T: Entity>(&mut self, filter: Filter) -> Result<MergeStats> {
        let rows = self
            .store
            .select(T::KIND, &filter)
            .await
            .map_err(|e| EngineError::store("fetch", e))?;

        let mut fetched = Vec::with_capacity(rows.len());
        for row in &rows {
            match T::from_record(row) {
                Ok(entity) => fetched.push(entity),
                Err(e) => tracing::warn!("Skipping undecodable {} row: {}", T::KIND, e),
            }
        }

        let in_partition = |entity: &T| {
            entity
                .to_record()
                .map(|record| filter.matches(&record))
                .unwrap_or(false)
        };
        let stats = T::collection_mut(&mut self.cache).merge_partition(in_partition, fetched);
        tracing::debug!(
            "Fetched {} {} rows ({} dropped from cache)",
            stats.fetched,
            T::KIND,
            stats.dropped
        );
        Ok(stats)
    }

    /// Fetch every entity kind in full and restore the persisted session.
    pub async fn load_all(&mut self) -> Result<()> {
        self.fetch::<User>(Filter::All).await?;
        self.fetch::<Persona>(Filter::All).await?;
        self.fetch::<Objective>(Filter::All).await?;
        self.fetch::<Gap>(Filter::All).await?;
        self.fetch::<Problem>(Filter::All).await?;
        self.fetch::<Project>(Filter::All).await?;
        self.fetch::<ThreadItem>(Filter::All).await?;
        self.fetch::<ThreadResult>(Filter::All).await?;
        self.fetch::<Task>(Filter::All).await?;
        self.fetch::<DoItem>(Filter::All).await?;
        self.fetch::<DontItem>(Filter::All).await?;
        self.fetch::<StarReport>(Filter::All).await?;
        self.fetch::<RetrospectiveReport>(Filter::All).await?;
        self.restore_session().await?;
        Ok(())
    }
}
