//! Concurrent fan-out over fallible operations

use std::future::Future;

use futures::future::join_all;
use tracing::debug;

use crate::resolver::error::{AggregateError, ResolverError};

/// Drive every operation concurrently and wait for all of them to settle
///
/// Returns each outcome in input order. Fails with an aggregate error carrying
/// every individual error only if the collection is non-empty and every
/// operation failed; an empty collection is not a failure.
pub async fn settle_all<I, F, T>(
    operation: &'static str,
    operations: I,
) -> Result<Vec<Result<T, ResolverError>>, ResolverError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, ResolverError>>,
{
    let outcomes = join_all(operations).await;

    let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    debug!(
        "{}: {} succeeded, {} failed",
        operation,
        outcomes.len() - failed,
        failed
    );

    if !outcomes.is_empty() && failed == outcomes.len() {
        let errors = outcomes.into_iter().filter_map(Result::err).collect();
        return Err(AggregateError::new(operation, errors).into());
    }

    Ok(outcomes)
}
