//! Lease database loading against on-disk fixtures.

use std::io::Write;

use chrono::{NaiveDate, NaiveDateTime};
use shaper_netinfo::dhcp::{load_dnsmasq_clients, load_isc_clients, LeaseStatus};

fn aug(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 8, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

#[tokio::test]
async fn loads_isc_lease_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "lease 10.9.0.7 {{\n  starts 3 2026/08/05 10:00:00;\n  ends 3 2026/08/05 14:00:00;\n  \
         binding state active;\n  hardware ethernet de:ad:be:ef:00:01;\n  \
         client-hostname \"camera\";\n}}\n"
    )
    .unwrap();

    let clients = load_isc_clients(file.path(), aug(5, 12)).await.unwrap();
    let camera = &clients["10.9.0.7"];
    assert_eq!(camera.hostname, "camera");
    assert_eq!(camera.status, LeaseStatus::Active);
    assert_eq!(camera.lease_remaining, Some(2 * 3600));
}

#[tokio::test]
async fn loads_dnsmasq_lease_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "1754500000 aa:bb:cc:00:11:22 10.9.0.8 printer *").unwrap();

    let clients = load_dnsmasq_clients(file.path(), 1_754_500_600).await.unwrap();
    let printer = &clients["10.9.0.8"];
    assert_eq!(printer.mac.as_deref(), Some("AA:BB:CC:00:11:22"));
    assert_eq!(printer.lease_remaining, Some(1200));
}

#[tokio::test]
async fn missing_lease_file_is_an_io_error() {
    let result = load_isc_clients("/definitely/not/here.leases".as_ref(), aug(1, 0)).await;
    assert!(result.is_err());
}
