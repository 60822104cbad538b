/// Returns the cached value for `$key`, or evaluates `$block`, stores the
/// result in the background with `$ttl` seconds and returns it.
///
/// A failed cache read is logged and treated as a miss, so an unavailable
/// Redis only costs the memoization. Errors from `$block` propagate, which
/// means the enclosing function must return `AppResult`. Use the macro as a
/// tail expression so the error type is inferred from the function signature.
///
/// # Example
/// ```rust,ignore
/// async fn is_live(&self, url: &str) -> AppResult<bool> {
///     cached!(self.cache, CacheKey::Liveness(url.to_string()), 600, self.probe(url))
/// }
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache.get_from_cache(&key).await {
            Ok(Some(cached)) => Ok(cached),
            outcome => {
                if let Err(e) = outcome {
                    tracing::warn!(key = %key, error = %e, "Cache read failed, treating as a miss");
                }
                let value = $block.await?;
                $cache.set_in_background(&key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
