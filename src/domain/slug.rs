//! Slug generation for categories created inline from the post form.
//!
//! `slug` transliterates non-ASCII input (Cyrillic titles become readable
//! Latin), and uniqueness is delegated to a caller-supplied predicate so the
//! generation logic stays independent of persistence.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Produce a slug the `is_unique` predicate accepts, suffixing `-2`, `-3`, ...
/// onto the base slug until one is free.
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(base.clone())
        .await
        .map_err(SlugAsyncError::Predicate)?
    {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_unique(candidate.clone())
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[test]
    fn derive_slug_transliterates_cyrillic() {
        let slug = derive_slug("Путешествия по Алтаю").expect("slug");
        assert!(slug.is_ascii());
        assert!(slug.contains('-'));
    }

    #[test]
    fn derive_slug_rejects_blank_and_symbol_only_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
        assert!(matches!(
            derive_slug("!!!"),
            Err(SlugError::Unrepresentable { .. })
        ));
    }

    #[tokio::test]
    async fn generate_unique_slug_appends_counter() {
        let existing = Arc::new(Mutex::new(vec!["travel".to_string()]));

        let slug = generate_unique_slug_async("Travel", |candidate| {
            let existing = existing.clone();
            async move {
                let mut guard = existing.lock().await;
                if guard.contains(&candidate) {
                    Ok::<bool, Infallible>(false)
                } else {
                    guard.push(candidate);
                    Ok(true)
                }
            }
        })
        .await
        .expect("unique slug");

        assert_eq!(slug, "travel-2");
    }

    #[tokio::test]
    async fn generate_unique_slug_gives_up_eventually() {
        let result =
            generate_unique_slug_async("Travel", |_| async { Ok::<bool, Infallible>(false) }).await;
        assert!(matches!(
            result,
            Err(SlugAsyncError::Slug(SlugError::Exhausted { .. }))
        ));
    }
}
