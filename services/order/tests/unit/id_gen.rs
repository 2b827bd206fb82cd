use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use marketplace_order::AppIdGenerator;

use crate::model::ut_time;

#[test]
fn unique_across_threads() {
    let gen = Arc::new(AppIdGenerator::new(19));
    let handles = (0..4)
        .map(|_| {
            let g = gen.clone();
            thread::spawn(move || (0..2000).map(|_| g.next_id()).collect::<Vec<_>>())
        })
        .collect::<Vec<_>>();
    let ids = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect::<Vec<_>>();
    let uniq = ids.iter().collect::<HashSet<_>>();
    assert_eq!(uniq.len(), ids.len());
}

#[test]
fn machine_code_embedded() {
    let g1 = AppIdGenerator::new(19);
    let g2 = AppIdGenerator::new(20);
    let (a, b) = (g1.next_id(), g2.next_id());
    assert_eq!((a >> 14) & 0xff, 19);
    assert_eq!((b >> 14) & 0xff, 20);
    let c = g1.next_id();
    assert!(c > a);
}

#[test]
fn order_number_format() {
    let g = AppIdGenerator::new(19);
    let num = g.order_number(ut_time());
    let (date, suffix) = num.split_once('-').unwrap();
    assert_eq!(date, "20240501");
    assert!(!suffix.is_empty());
    assert!(suffix
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    assert_ne!(num, g.order_number(ut_time()));
}
