// 相似度与存储预算的不变量：随机输入下必须恒成立

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use proptest::prelude::*;

use grab_core::classify::ContentKind;
use grab_core::config::CoreConfig;
use grab_core::dedup::similarity;
use grab_core::store::ItemStore;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("{}_{}", prefix, nanos))
}

proptest! {
    #[test]
    fn similarity_is_always_within_unit_interval(
        a in ".{0,200}",
        b in ".{0,200}",
    ) {
        let s = similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s), "similarity out of range: {}", s);
    }

    #[test]
    fn similarity_with_self_is_one(a in ".{0,200}") {
        let s = similarity(&a, &a);
        prop_assert!((s - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_is_symmetric(a in ".{0,120}", b in ".{0,120}") {
        prop_assert!((similarity(&a, &b) - similarity(&b, &a)).abs() < f64::EPSILON);
    }
}

proptest! {
    // 每轮用例都要开独立的 SQLite + blob 目录，压低用例数
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn store_never_exceeds_budget_or_count_cap(
        sizes in prop::collection::vec(0usize..2000, 1..20),
    ) {
        let dir = unique_temp_dir("grab_prop_budget");
        let config = CoreConfig {
            max_total_bytes: 4096,
            max_items: 5,
            ..CoreConfig::default()
        };
        let mut store = ItemStore::open(&dir, &config).expect("open store");

        for (i, size) in sizes.iter().enumerate() {
            let content = format!("payload number {} of {} bytes", i, size);
            let bytes = vec![0u8; *size];
            let overflow = if *size > 0 { Some(bytes.as_slice()) } else { None };
            store
                .insert(&content, ContentKind::Text, overflow, Some("txt"))
                .expect("insert");

            // 条数上限恒成立
            prop_assert!(store.items().len() <= 5);

            // 字节预算恒成立，除非只剩最新一条（豁免）
            let total: u64 = store.items().iter().map(|item| item.byte_size).sum();
            prop_assert!(
                total <= 4096 || store.items().len() == 1,
                "budget violated with {} items and {} bytes",
                store.items().len(),
                total
            );

            // 最新一条永远在场
            prop_assert_eq!(store.items()[0].content.as_str(), content.as_str());
        }

        let _ = fs::remove_dir_all(&dir);
    }
}
