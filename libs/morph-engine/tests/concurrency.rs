use std::sync::Arc;

use morph_api::Record;
use morph_engine::{Adapter, AdapterOptions, MetadataCache, Scope};
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct Event {
    name: String,
    seq: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
struct EventRow {
    name: String,
    seq: u64,
}

#[test]
fn adapting_while_registrations_change() {
    let adapter = Adapter::with_cache(AdapterOptions::default(), Arc::new(MetadataCache::new()));
    let event = Event {
        name: "boot".into(),
        seq: 1,
    };

    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                let tag = if i % 2 == 0 { "even" } else { "odd" };
                adapter.register_converter(Scope::destination::<EventRow>(), "name", move |_| Ok(Some(json!(tag))));
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..200 {
                    let row: EventRow = adapter.make(&event).unwrap();
                    assert!(["boot", "even", "odd"].contains(&row.name.as_str()));
                    assert_eq!(row.seq, 1);
                }
            });
        }
    });

    let row: EventRow = adapter.make(&event).unwrap();
    assert_eq!(row.name, "odd");
}

#[test]
fn concurrent_writers_do_not_lose_registrations() {
    let adapter = Adapter::new();
    std::thread::scope(|s| {
        for writer in 0..4 {
            let adapter = &adapter;
            s.spawn(move || {
                for i in 0..25 {
                    let field = format!("field_{writer}_{i}");
                    adapter.register_validator(Scope::Global, &field, |_| Ok(()));
                }
            });
        }
    });
    assert_eq!(adapter.registries().validators.len(), 100);
}

#[test]
fn first_metadata_build_is_shared() {
    let adapter = Adapter::with_cache(AdapterOptions::default(), Arc::new(MetadataCache::new()));
    let built: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| adapter.warm_up::<Event>())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(built.iter().all(|m| Arc::ptr_eq(m, &built[0])));
    assert_eq!(adapter.metadata().len(), 1);
}
