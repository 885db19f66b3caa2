/// Returns a cached value or computes, stores and returns it.
///
/// `$cache` must expose `get_from_cache` and `set_in_background`; `$block` is
/// a future resolving to `AppResult<T>`. Use it as the tail expression of a
/// function returning `AppResult<T>`.
///
/// # Example
/// ```rust,ignore
/// async fn details(&self, tmdb_id: i64) -> AppResult<NewMovie> {
///     cached!(self.cache, CacheKey::TmdbDetails(MediaType::Movie, tmdb_id), DETAILS_TTL, async {
///         self.fetch_details(tmdb_id).await
///     })
/// }
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get_from_cache(&$key).await? {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
