//! Parallel keyword search across every live document.
//!
//! A scoped fan-out of scanner threads shares two things: a next-key
//! counter claimed by atomic fetch-add, and a hit bitmap with one bit per
//! record slot. Bits are disjoint per key, so scanners never contend on
//! them, and the bitmap is only read after every scanner has joined.

use std::fs::File;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use docket_store::{count_matching_lines, document_path};

use crate::error::ServerError;
use crate::handlers::ServerContext;

/// Scanner threads per search are clamped to ten per hardware thread.
const WORKERS_PER_CPU: u32 = 10;

/// Scan every live document for `keyword`, returning the matching keys in
/// ascending order. Tombstoned slots and unreadable bodies contribute no
/// match. The result is independent of the worker count.
pub fn parallel_search(
    ctx: &ServerContext,
    keyword: &[u8],
    requested: u32,
) -> Result<Vec<u32>, ServerError> {
    let total = ctx.store.total()?;
    if total == 0 {
        return Ok(Vec::new());
    }

    let workers = clamp_workers(requested, total);
    let next_key = AtomicU32::new(0);
    let bitmap: Vec<AtomicU8> = (0..(total as usize + 7) / 8)
        .map(|_| AtomicU8::new(0))
        .collect();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| scan_worker(ctx, keyword, total, &next_key, &bitmap));
        }
    });

    let mut keys = Vec::new();
    for key in 0..total {
        let bits = bitmap[key as usize / 8].load(Ordering::Relaxed);
        if bits & (1 << (key % 8)) != 0 {
            keys.push(key);
        }
    }
    Ok(keys)
}

fn clamp_workers(requested: u32, total: u32) -> u32 {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1);
    requested
        .max(1)
        .min(WORKERS_PER_CPU.saturating_mul(cpus))
        .min(total)
}

fn scan_worker(
    ctx: &ServerContext,
    keyword: &[u8],
    total: u32,
    next_key: &AtomicU32,
    bitmap: &[AtomicU8],
) {
    loop {
        let key = next_key.fetch_add(1, Ordering::Relaxed);
        if key >= total {
            break;
        }
        if document_matches(ctx, keyword, key) {
            bitmap[key as usize / 8].fetch_or(1 << (key % 8), Ordering::Relaxed);
        }
    }
}

fn document_matches(ctx: &ServerContext, keyword: &[u8], key: u32) -> bool {
    // Tombstones and slots past a concurrent reader's view simply miss.
    let Ok(doc) = ctx.store.get(key) else {
        return false;
    };
    let Ok(path) = document_path(&ctx.docroot, &doc) else {
        return false;
    };
    let mut body = match File::open(&path) {
        Ok(file) => file,
        Err(err) => {
            tracing::debug!(
                target = "docket.search",
                key,
                path = %path.display(),
                error = %err,
                "skipping unreadable document body"
            );
            return false;
        }
    };
    match count_matching_lines(&mut body, keyword, true) {
        Ok(count) => count > 0,
        Err(err) => {
            tracing::debug!(
                target = "docket.search",
                key,
                error = %err,
                "document scan failed"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_store::{Document, RecordStore};
    use std::sync::Arc;

    fn fixture() -> (tempfile::TempDir, ServerContext) {
        let dir = tempfile::tempdir().unwrap();
        let docroot = dir.path().join("docs");
        std::fs::create_dir_all(&docroot).unwrap();
        let store = RecordStore::open(dir.path().join("index.bin")).unwrap();
        let ctx = ServerContext {
            store: Arc::new(store),
            docroot,
        };
        (dir, ctx)
    }

    fn add_doc(ctx: &ServerContext, name: &str, body: &str) -> u32 {
        std::fs::write(ctx.docroot.join(name), body).unwrap();
        ctx.store
            .append(&Document {
                title: name.as_bytes().to_vec(),
                authors: b"A".to_vec(),
                path: name.as_bytes().to_vec(),
                year: 2020,
            })
            .unwrap()
    }

    #[test]
    fn result_set_is_independent_of_worker_count() {
        let (_dir, ctx) = fixture();
        for i in 0..20 {
            let body = if i % 3 == 0 { "has needle\n" } else { "nothing\n" };
            add_doc(&ctx, &format!("d{i}.txt"), body);
        }
        let expected: Vec<u32> = (0..20).filter(|i| i % 3 == 0).collect();

        for workers in [1, 2, 7, 64] {
            assert_eq!(
                parallel_search(&ctx, b"needle", workers).unwrap(),
                expected,
                "workers = {workers}"
            );
        }
    }

    #[test]
    fn tombstoned_documents_never_match() {
        let (_dir, ctx) = fixture();
        add_doc(&ctx, "live.txt", "needle\n");
        let dead = add_doc(&ctx, "dead.txt", "needle\n");
        ctx.store.delete(dead).unwrap();

        assert_eq!(parallel_search(&ctx, b"needle", 4).unwrap(), vec![0]);
    }

    #[test]
    fn missing_body_files_are_skipped() {
        let (_dir, ctx) = fixture();
        add_doc(&ctx, "present.txt", "needle\n");
        ctx.store
            .append(&Document {
                title: b"ghost".to_vec(),
                authors: b"A".to_vec(),
                path: b"ghost.txt".to_vec(),
                year: 2020,
            })
            .unwrap();

        assert_eq!(parallel_search(&ctx, b"needle", 4).unwrap(), vec![0]);
    }

    #[test]
    fn empty_store_yields_an_empty_result() {
        let (_dir, ctx) = fixture();
        assert!(parallel_search(&ctx, b"kw", 4).unwrap().is_empty());
    }

    #[test]
    fn worker_clamp_bounds() {
        assert_eq!(clamp_workers(0, 100), 1);
        assert_eq!(clamp_workers(3, 100), 3);
        assert_eq!(clamp_workers(50, 2), 2);
    }
}
