//! Benchmarks for flat-map lookups and scan merging

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cellstore::{
    ArrayStore, Cell, CellStore, CellType, FlatCellMap, FlatMapScanner, ForwardScanHeap,
    ReversedScanHeap, ScannerPort, LATEST_TIMESTAMP,
};

fn kv(row: u32, ts: i64) -> Cell {
    Cell::new(
        format!("row-{row:06}"),
        "f",
        "q",
        ts,
        CellType::Put,
        vec![0u8; 32],
    )
}

fn build_store(rows: u32, versions: i64) -> Arc<CellStore> {
    let mut cells = Vec::new();
    for row in 0..rows {
        for ts in 1..=versions {
            cells.push(kv(row, ts));
        }
    }
    Arc::new(CellStore::Array(ArrayStore::from_cells(cells)))
}

fn bench_flat_map_lookups(c: &mut Criterion) {
    let map = FlatCellMap::new(build_store(10_000, 3));
    let probe = kv(5_000, 2);

    c.bench_function("flat_map_floor_key", |b| {
        b.iter(|| black_box(map.floor_key(black_box(&probe))))
    });
    c.bench_function("flat_map_sub_map", |b| {
        let from = kv(2_500, 3);
        let to = kv(7_500, 1);
        b.iter(|| black_box(map.sub_map(black_box(&from), true, black_box(&to), false).len()))
    });
}

fn bench_forward_merge(c: &mut Criterion) {
    c.bench_function("forward_heap_drain_8_sources", |b| {
        b.iter(|| {
            let scanners: Vec<Box<dyn ScannerPort>> = (0..8)
                .map(|shard| {
                    let cells = (0..1_000u32)
                        .map(|i| kv(i * 8 + shard, 1))
                        .collect::<Vec<_>>();
                    Box::new(FlatMapScanner::from_store(Arc::new(CellStore::Array(
                        ArrayStore::from_cells(cells),
                    )))) as Box<dyn ScannerPort>
                })
                .collect();
            let mut heap = ForwardScanHeap::new(scanners).unwrap();
            let mut count = 0usize;
            while let Some(cell) = heap.next().unwrap() {
                count += black_box(cell.value().len());
            }
            count
        })
    });
}

fn bench_reversed_merge(c: &mut Criterion) {
    let top = Cell::new("row-999999", "", "", LATEST_TIMESTAMP, CellType::Maximum, "");
    c.bench_function("reversed_heap_drain_8_sources", |b| {
        b.iter(|| {
            let scanners: Vec<Box<dyn ScannerPort>> = (0..8)
                .map(|shard| {
                    let cells = (0..1_000u32)
                        .map(|i| kv(i * 8 + shard, 1))
                        .collect::<Vec<_>>();
                    let mut scanner = FlatMapScanner::from_store(Arc::new(CellStore::Array(
                        ArrayStore::from_cells(cells),
                    )));
                    scanner.backward_seek(&top).unwrap();
                    Box::new(scanner) as Box<dyn ScannerPort>
                })
                .collect();
            let mut heap = ReversedScanHeap::new(scanners).unwrap();
            let mut count = 0usize;
            while let Some(cell) = heap.next().unwrap() {
                count += black_box(cell.value().len());
            }
            count
        })
    });
}

criterion_group!(
    benches,
    bench_flat_map_lookups,
    bench_forward_merge,
    bench_reversed_merge
);
criterion_main!(benches);
