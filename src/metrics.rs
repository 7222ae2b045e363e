use tracing::trace;

// Lightweight metrics helpers; the Prometheus recorder in main captures the
// tracing layer, so these stay macro-free.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "jomion.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn feed_items_fetched(feed: &'static str, count: usize) {
    trace!(
        target = "jomion.metrics",
        feed = feed,
        count = count as u64,
        "feed_items_fetched"
    );
}

pub fn import_outcome(imported: u32, failed: u32) {
    trace!(
        target = "jomion.metrics",
        imported = imported,
        failed = failed,
        "bulk_import_outcome"
    );
}
