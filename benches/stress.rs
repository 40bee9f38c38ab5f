use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Datelike, Days, NaiveDate, Weekday};
use roomd::engine::{Engine, EngineError};
use roomd::validate::ScheduleParams;

/// Half-hour slots per working day. Closed intervals, so each ends one
/// minute before the next begins.
const SLOTS_PER_DAY: usize = 18;

fn bench_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roomd_bench");
    std::fs::create_dir_all(&dir).expect("create bench dir");
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

/// The `n`th weekday on or after 2022-01-10.
fn weekday(n: usize) -> NaiveDate {
    let mut date = NaiveDate::from_ymd_opt(2022, 1, 10).expect("valid date");
    let mut seen = 0;
    loop {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            if seen == n {
                return date;
            }
            seen += 1;
        }
        date = date + Days::new(1);
    }
}

/// Params for the `i`th slot of room `room`, spilling onto following weekdays.
fn slot_params(room: i64, i: usize) -> ScheduleParams {
    let date = weekday(i / SLOTS_PER_DAY).format("%Y-%m-%d").to_string();
    let start = 9 * 60 + (i % SLOTS_PER_DAY) * 30;
    let end = start + 29;
    ScheduleParams::new(
        room,
        &date,
        &format!("{:02}:{:02}", start / 60, start % 60),
        &format!("{:02}:{:02}", end / 60, end % 60),
    )
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

async fn phase1_sequential() {
    let engine = Engine::new(bench_wal_path("sequential.wal")).expect("open engine");

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let params = slot_params(1, i);
        let t = Instant::now();
        engine.create(&params).await.expect("sequential create");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    println!(
        "  {n} creates in {:.2}s = {:.0} ops/sec",
        elapsed.as_secs_f64(),
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("create", &mut latencies);
}

async fn phase2_concurrent() {
    let engine = Arc::new(Engine::new(bench_wal_path("concurrent.wal")).expect("open engine"));
    let n_tasks = 10;
    let n_per_task = 200;

    let start = Instant::now();
    let mut handles = Vec::new();

    for room in 1..=n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..n_per_task {
                engine
                    .create(&slot_params(room as i64, i))
                    .await
                    .expect("concurrent create");
            }
        }));
    }

    for h in handles {
        h.await.expect("task panicked");
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} rooms x {n_per_task} schedules = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_read_under_load() {
    let engine = Arc::new(Engine::new(bench_wal_path("read_load.wal")).expect("open engine"));

    for i in 0..500 {
        engine.create(&slot_params(1, i)).await.expect("seed create");
    }

    let writer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for i in 0..1000 {
                engine.create(&slot_params(2, i)).await.expect("background create");
            }
        })
    };

    let n = 500;
    let mut list_latencies = Vec::with_capacity(n);
    let mut room_latencies = Vec::with_capacity(n);
    let date = weekday(3);
    for _ in 0..n {
        let t = Instant::now();
        let _ = engine.list_by_date(date).await;
        list_latencies.push(t.elapsed());

        let t = Instant::now();
        let _ = engine.list_by_date_and_room(date, 1).await;
        room_latencies.push(t.elapsed());
    }

    writer.await.expect("writer panicked");
    print_latency("list_by_date", &mut list_latencies);
    print_latency("list_by_date_and_room", &mut room_latencies);
}

async fn phase4_contention() {
    let engine = Arc::new(Engine::new(bench_wal_path("contention.wal")).expect("open engine"));
    let n_tasks = 100;

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create(&ScheduleParams::new(1, "2022-01-10", "10:00", "11:00"))
                .await
        }));
    }

    let mut admitted = 0;
    let mut rejected = 0;
    for h in handles {
        match h.await.expect("task panicked") {
            Ok(_) => admitted += 1,
            Err(EngineError::Overlap) => rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    println!(
        "  {n_tasks} creates on one window: {admitted} admitted, {rejected} rejected in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    assert_eq!(admitted, 1);
}

#[tokio::main]
async fn main() {
    println!("=== roomd stress benchmark ===\n");

    println!("[phase 1] sequential write throughput");
    phase1_sequential().await;

    println!("\n[phase 2] concurrent write throughput");
    phase2_concurrent().await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load().await;

    println!("\n[phase 4] single-window contention");
    phase4_contention().await;

    println!("\n=== benchmark complete ===");
}
