//! Batch lifecycle tests: CSV input through to CSV output, resumption
//! after an interrupted run, and the sharded-worker merge.

mod common;

use common::*;
use sitefinder::batch;
use wiremock::MockServer;

#[tokio::test]
async fn test_input_csv_to_output_csv() {
    let server = MockServer::start().await;
    mount_search(&server, "Acme Widgets", &["https://acmewidgets.co.uk/"]).await;
    mount_search(&server, "Blue Bottle", &["https://bluebottle.co.uk/"]).await;
    mount_no_results_fallback(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.csv");
    std::fs::write(
        &input_path,
        "Company Number,Company Name,Date Incorporated,Active Directors,Registered Address\n\
         12345678,Acme Widgets Ltd,2001-05-14,3,\"1 High Street, London, United Kingdom\"\n\
         87654321,Blue Bottle Ltd,2015-09-01,2,\"42 Roast Lane, Bristol\"\n",
    )
    .unwrap();

    let items = batch::load_companies(&input_path).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].registered_address, "1 High Street, London, United Kingdom");

    let driver = driver_against(&server, dir.path(), true);
    assert_eq!(driver.sweep(&items).await, 2);

    let lines = output_lines(dir.path());
    assert_eq!(lines.len(), 3);
    // Commas inside the address survive the round trip quoted.
    assert!(lines[1].contains("\"1 High Street, London, United Kingdom\""));
    assert!(lines[1].ends_with(",https://acmewidgets.co.uk,100"));
    assert!(lines[2].ends_with(",https://bluebottle.co.uk,100"));
}

#[tokio::test]
async fn test_interrupted_run_resumes_without_duplicates() {
    let server = MockServer::start().await;
    mount_search(&server, "Delta Tools", &["https://deltatools.co.uk/"]).await;
    mount_search(&server, "Fern Bakery", &["https://fernbakery.co.uk/"]).await;
    mount_no_results_fallback(&server).await;

    let dir = tempfile::tempdir().unwrap();

    // Two of four companies were resolved before the interruption.
    let store = history(dir.path());
    store
        .record("12345678", "Acme Widgets Ltd", "https://pinned-acme.example", 600, 800)
        .unwrap();
    store
        .record("33334444", "Echo Gardens Ltd", "none", 0, -1)
        .unwrap();

    let items = [
        acme(),
        company("11112222", "Delta Tools Ltd", "9 Forge Way, Sheffield"),
        company("33334444", "Echo Gardens Ltd", "5 Fen Road, Ely"),
        company("55556666", "Fern Bakery Ltd", "80 Oven Lane, York"),
    ];

    let driver = driver_against(&server, dir.path(), true);
    assert_eq!(driver.sweep(&items).await, 4);

    // Only the remaining half was resolved; the earlier rows kept their
    // original values.
    assert_eq!(store.count().unwrap(), 4);
    let pinned = store.get("12345678").unwrap().unwrap();
    assert_eq!(pinned.result, "https://pinned-acme.example");
    assert_eq!(pinned.confidence, 600);

    let fresh = store.get("11112222").unwrap().unwrap();
    assert_eq!(fresh.result, "https://deltatools.co.uk");

    // The output file gained rows for the fresh items only.
    let lines = output_lines(dir.path());
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("deltatools"));
    assert!(lines[2].contains("fernbakery"));

    // Another pass is a pure no-op: everything already done.
    assert_eq!(driver.sweep(&items).await, 4);
    assert_eq!(store.count().unwrap(), 4);
    assert_eq!(output_lines(dir.path()).len(), 3);
}

#[tokio::test]
async fn test_combine_rebuilds_output_from_history() {
    let server = MockServer::start().await;
    mount_no_results_fallback(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let store = history(dir.path());
    store
        .record("12345678", "Acme Widgets Ltd", "https://acmewidgets.co.uk", 700, 700)
        .unwrap();
    store
        .record("87654321", "Blue Bottle Ltd", "none", 0, -1)
        .unwrap();
    store
        .record("11112222", "Delta Tools Ltd", "https://deltatools.co.uk", 550, 700)
        .unwrap();

    let items = [
        acme(),
        company("87654321", "Blue Bottle Ltd", "42 Roast Lane, Bristol"),
        company("11112222", "Delta Tools Ltd", "9 Forge Way, Sheffield"),
    ];

    let driver = driver_against(&server, dir.path(), true);

    assert_eq!(driver.combine_pass(&items).unwrap(), 3);
    let lines = output_lines(dir.path());
    assert_eq!(lines.len(), 4);
    assert!(lines[1].ends_with(",https://acmewidgets.co.uk,100"));
    assert!(lines[2].ends_with(",none,-1"));
    assert!(lines[3].ends_with(",https://deltatools.co.uk,79"));

    // A second pass rebuilds the file instead of appending to it.
    assert_eq!(driver.combine_pass(&items).unwrap(), 3);
    assert_eq!(output_lines(dir.path()).len(), 4);
}

#[tokio::test]
async fn test_sharded_workers_partition_then_combine() {
    let server = MockServer::start().await;
    mount_search(&server, "Acme Widgets", &["https://acmewidgets.co.uk/"]).await;
    mount_search(&server, "Blue Bottle", &["https://bluebottle.co.uk/"]).await;
    mount_search(&server, "Delta Tools", &["https://deltatools.co.uk/"]).await;
    mount_search(&server, "Echo Gardens", &["https://echogardens.co.uk/"]).await;
    mount_search(&server, "Fern Bakery", &["https://fernbakery.co.uk/"]).await;
    mount_no_results_fallback(&server).await;

    let items = vec![
        acme(),
        company("87654321", "Blue Bottle Ltd", "42 Roast Lane, Bristol"),
        company("11112222", "Delta Tools Ltd", "9 Forge Way, Sheffield"),
        company("33334444", "Echo Gardens Ltd", "5 Fen Road, Ely"),
        company("55556666", "Fern Bakery Ltd", "80 Oven Lane, York"),
    ];

    let dir = tempfile::tempdir().unwrap();

    // Each worker sweeps its own slice and writes history only.
    for worker in 1..=3 {
        let slice = batch::shard(&items, worker, 3);
        let driver = driver_against(&server, dir.path(), false);
        assert_eq!(driver.sweep(slice).await, slice.len());
    }

    assert_eq!(history(dir.path()).count().unwrap(), 5);
    assert!(!output_path(dir.path()).exists());

    // The merge writes one row per company.
    let driver = driver_against(&server, dir.path(), true);
    assert_eq!(driver.combine_pass(&items).unwrap(), 5);
    assert_eq!(output_lines(dir.path()).len(), 6);
}
