//! Worker-pool plumbing shared by the parallel phases.
//!
//! One pool shape, two feeds: a bounded channel of items (struct index,
//! named-block registry) or pre-partitioned index ranges (render-site
//! collection). Pools are sized to the processor count and joined before the
//! caller proceeds.

/// Pool size: one worker per available processor.
pub fn worker_count() -> usize {
    num_cpus::get().max(1)
}

/// Feed `items` through a bounded channel to a fixed pool running `work`.
/// Returns after every worker has drained the channel and exited.
pub fn for_each_parallel<T, F>(items: Vec<T>, work: F)
where
    T: Send,
    F: Fn(T) + Sync,
{
    let workers = worker_count();
    let (tx, rx) = async_channel::bounded::<T>(workers * 2);
    let work = &work;

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            scope.spawn(move || {
                while let Ok(item) = rx.recv_blocking() {
                    work(item);
                }
            });
        }
        for item in items {
            if tx.send_blocking(item).is_err() {
                break;
            }
        }
        drop(tx);
    });
}

/// Partition `items` into per-worker index ranges, map each chunk on its own
/// worker, and collect the chunk results through a join channel. Chunk order
/// is not preserved; callers sort afterwards.
pub fn map_chunks<T, R, F>(items: Vec<T>, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(Vec<T>) -> Vec<R> + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }

    let workers = worker_count();
    let chunk_size = items.len().div_ceil(workers);
    let mut chunks: Vec<Vec<T>> = Vec::with_capacity(workers);
    let mut items = items;
    while !items.is_empty() {
        let rest = items.split_off(items.len().min(chunk_size));
        chunks.push(std::mem::replace(&mut items, rest));
    }

    let (tx, rx) = async_channel::bounded::<Vec<R>>(chunks.len());
    let work = &work;

    std::thread::scope(|scope| {
        for chunk in chunks {
            let tx = tx.clone();
            scope.spawn(move || {
                let out = work(chunk);
                let _ = tx.send_blocking(out);
            });
        }
        drop(tx);
    });

    let mut results = Vec::new();
    while let Ok(mut chunk) = rx.recv_blocking() {
        results.append(&mut chunk);
    }
    results
}
