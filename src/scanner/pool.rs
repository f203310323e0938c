//! Bounded scan worker pool.
//!
//! Paths are fed through a bounded crossbeam channel to `parallelism` scoped
//! worker threads. Each worker writes its outcome into the slot matching the
//! path's walk index, so the returned vector is always in walk order no matter
//! which worker finished first.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel as channel;
use parking_lot::Mutex;

use crate::scanner::stream::{ScanOutcome, StreamingScanner};

/// Upper bound on queued, not yet claimed, paths.
const QUEUE_DEPTH: usize = 1024;

/// Scan `paths` under `root` on up to `parallelism` threads.
pub fn scan_all(
    scanner: StreamingScanner<'_>,
    root: &Path,
    paths: &[PathBuf],
    parallelism: usize,
) -> Vec<ScanOutcome> {
    let workers = parallelism.clamp(1, paths.len().max(1));
    if workers == 1 {
        return paths
            .iter()
            .map(|path| scanner.scan_file(root, path))
            .collect();
    }

    let slots: Mutex<Vec<Option<ScanOutcome>>> = Mutex::new(vec![None; paths.len()]);
    let (work_tx, work_rx) = channel::bounded::<usize>(QUEUE_DEPTH);

    thread::scope(|scope| {
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let slots = &slots;
            scope.spawn(move || {
                for index in &work_rx {
                    let outcome = scanner.scan_file(root, &paths[index]);
                    slots.lock()[index] = Some(outcome);
                }
            });
        }
        // Drop the original receiver so only workers hold one.
        drop(work_rx);

        for index in 0..paths.len() {
            if work_tx.send(index).is_err() {
                break;
            }
        }
        drop(work_tx);
    });

    slots
        .into_inner()
        .into_iter()
        .zip(paths)
        .map(|(slot, path)| {
            // Empty only if the queue closed early.
            slot.unwrap_or_else(|| scanner.scan_file(root, path))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::patterns::LinePatternRegistry;
    use crate::scanner::stream::DEFAULT_CHUNK_SIZE;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn results_follow_input_order() {
        let tmp = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for i in 0..40 {
            let path = tmp.path().join(format!("f{i:02}.ts"));
            fs::write(&path, "x\n".repeat(i + 1)).unwrap();
            paths.push(path);
        }

        let reg = LinePatternRegistry::new().unwrap();
        let scanner = StreamingScanner::new(&reg, DEFAULT_CHUNK_SIZE);
        let outcomes = scan_all(scanner, tmp.path(), &paths, 6);

        assert_eq!(outcomes.len(), 40);
        for (i, outcome) in outcomes.iter().enumerate() {
            match outcome {
                ScanOutcome::Scanned(result) => {
                    assert_eq!(result.relative_path, format!("f{i:02}.ts"));
                    assert_eq!(result.line_count, i + 1);
                }
                ScanOutcome::Failed(failure) => panic!("unexpected failure: {failure:?}"),
            }
        }
    }

    #[test]
    fn parallel_and_serial_agree() {
        let tmp = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for i in 0..12 {
            let path = tmp.path().join(format!("m{i}.py"));
            fs::write(&path, format!("# return {i}\nprint 'x'\n")).unwrap();
            paths.push(path);
        }
        paths.push(tmp.path().join("missing.py"));

        let reg = LinePatternRegistry::new().unwrap();
        let scanner = StreamingScanner::new(&reg, 5);
        assert_eq!(
            scan_all(scanner, tmp.path(), &paths, 1),
            scan_all(scanner, tmp.path(), &paths, 4)
        );
    }

    #[test]
    fn empty_input_is_empty_output() {
        let reg = LinePatternRegistry::new().unwrap();
        let scanner = StreamingScanner::new(&reg, DEFAULT_CHUNK_SIZE);
        assert!(scan_all(scanner, Path::new("."), &[], 8).is_empty());
    }
}
