use crate::{
    catalog::{Catalog, Resolution},
    request::RequestTable,
    ThreadPool,
};
use std::sync::{mpsc, Arc};
use tracing::{debug, warn};

/// Resolves every request in `table` against `catalog` on a pool of
/// `workers` threads.
///
/// Misses are printed as soon as they are known. Results are written back on
/// the calling thread once the whole batch is done.
pub fn resolve_all(table: &mut RequestTable, catalog: Arc<Catalog>, workers: usize) {
    let (sender, receiver) = mpsc::channel::<(String, Resolution)>();
    let mut pool = ThreadPool::new(workers);
    debug!(packages = table.len(), workers = pool.size(), "resolving packages");

    for request in table.iter() {
        let name = request.name().to_string();
        let catalog = Arc::clone(&catalog);
        let sender = sender.clone();

        pool.execute(move || {
            let resolution = catalog.resolve(&name);
            if let Some(report) = resolution.miss_report(&name) {
                println!("{}", report);
            }
            if sender.send((name, resolution)).is_err() {
                debug!("resolution dropped, receiver closed");
            }
        });
    }

    drop(sender);
    pool.join();

    for (name, resolution) in receiver {
        debug!(package = %name, %resolution, "resolved");
        if !table.set_resolution(&name, resolution.into_url()) {
            warn!(package = %name, "resolution for unknown package dropped");
        }
    }
}
