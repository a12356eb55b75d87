/// Read-through access to a [`PosterStore`](crate::cache::PosterStore).
///
/// Returns the stored bytes when present. Otherwise the block is awaited to
/// produce the bytes, which are handed to the store's background writer and
/// returned. Must be used inside a function returning `AppResult`.
///
/// # Example
/// ```rust,ignore
/// let bytes = read_through_poster!(store, key, async {
///     catalog.download_image(&poster_path).await
/// });
/// ```
#[macro_export]
macro_rules! read_through_poster {
    ($store:expr, $key:expr, $block:expr) => {{
        if let Some(cached) = $store.get(&$key).await? {
            Ok::<Vec<u8>, $crate::error::AppError>(cached)
        } else {
            let bytes: Vec<u8> = $block.await?;
            $store.put(&$key, bytes.clone());
            Ok(bytes)
        }
    }};
}
