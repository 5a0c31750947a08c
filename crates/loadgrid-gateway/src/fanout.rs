//! Concurrent fan-out to many workers.
//!
//! Each call runs on its own task in a `JoinSet`. Results are collected
//! per app; one failing or panicking call never hides the others.

use std::collections::BTreeMap;
use std::future::Future;

use tokio::task::JoinSet;
use tracing::warn;

use loadgrid_core::{LoadgridError, LoadgridResult};

/// Run `call` once per `(app, input)` pair and collect every outcome.
///
/// Timeouts belong to `call` itself (the upstream client bounds each
/// request), so this only has to wait for the set to drain.
pub async fn fan_out<I, T, F, Fut>(
    targets: impl IntoIterator<Item = (String, I)>,
    call: F,
) -> BTreeMap<String, LoadgridResult<T>>
where
    F: Fn(String, I) -> Fut,
    Fut: Future<Output = LoadgridResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut names = Vec::new();
    let mut set = JoinSet::new();

    for (app, input) in targets {
        names.push(app.clone());
        let fut = call(app.clone(), input);
        set.spawn(async move { (app, fut.await) });
    }

    let mut results = BTreeMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((app, result)) => {
                results.insert(app, result);
            }
            Err(e) => warn!(error = %e, "fan-out task failed"),
        }
    }

    // A task that panicked lost its name along with its result.
    for app in names {
        results
            .entry(app.clone())
            .or_insert_with(|| Err(LoadgridError::upstream(app, "request task failed")));
    }

    results
}
