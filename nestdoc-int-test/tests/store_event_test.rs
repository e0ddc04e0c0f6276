use nestdoc::collection::Document;
use nestdoc::common::Value;
use nestdoc::doc;
use nestdoc::store::{StoreEventInfo, StoreEventListener, StoreEvents};
use nestdoc_int_test::test_util::{cleanup, create_test_context, run_test};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[ctor::ctor]
fn init() {
    colog::init();
}

fn wait_for_event<F: Fn() -> bool>(timeout_ms: u64, check: F) {
    awaitility::at_most(Duration::from_millis(timeout_ms)).until(check);
}

type Seen = Arc<Mutex<Vec<(StoreEvents, Option<Document>)>>>;

fn listener(seen: &Seen) -> StoreEventListener {
    let seen = seen.clone();
    StoreEventListener::new(move |event: StoreEventInfo| {
        seen.lock()
            .unwrap()
            .push((event.event_type(), event.item()));
        Ok(())
    })
}

#[test]
fn test_embedded_save_writes_parent() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let seen: Seen = Arc::new(Mutex::new(Vec::new()));
            let user = db.create("User", doc! { name: "John Doe" })?;
            db.subscribe(listener(&seen))?;

            user.embeds_many("addresses")?
                .create(doc! { city: "Paris" })?;

            wait_for_event(1000, || !seen.lock().unwrap().is_empty());
            let events = seen.lock().unwrap().clone();
            assert_eq!(events.len(), 1);
            let (event_type, item) = &events[0];
            assert_eq!(*event_type, StoreEvents::Update);
            let item = item.clone().unwrap();
            match item.get("_addresses") {
                Value::Array(records) => assert_eq!(records.len(), 1),
                other => panic!("expected an array, got {:?}", other),
            }
            assert_eq!(item.get("name"), Value::from("John Doe"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_in_memory_changes_do_not_write() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let seen: Seen = Arc::new(Mutex::new(Vec::new()));
            let user = db.create("User", doc! { name: "John Doe" })?;
            let paris = user
                .embeds_many("addresses")?
                .create(doc! { city: "Paris" })?
                .unwrap();
            db.subscribe(listener(&seen))?;

            let addresses = user.embeds_many("addresses")?;
            addresses.associate(&db.make("Address", doc! { city: "Rome" })?)?;
            addresses.dissociate([&paris])?;
            user.embeds_one("father")?
                .associate(&db.make("User", doc! { name: "Mark Doe" })?)?;
            assert!(seen.lock().unwrap().is_empty());

            assert!(user.save()?);
            wait_for_event(1000, || seen.lock().unwrap().len() == 1);
            assert_eq!(seen.lock().unwrap()[0].0, StoreEvents::Update);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_nested_save_writes_top_level_once_per_level() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let seen: Seen = Arc::new(Mutex::new(Vec::new()));
            let user = db.create("User", doc! { name: "John Doe" })?;
            let father = user
                .embeds_one("father")?
                .create(doc! { name: "Mark Doe" })?
                .unwrap();
            db.subscribe(listener(&seen))?;

            father
                .embeds_one("father")?
                .create(doc! { name: "Steve Doe" })?;

            wait_for_event(1000, || !seen.lock().unwrap().is_empty());
            let events = seen.lock().unwrap().clone();
            assert_eq!(events.len(), 1);
            let stored = events[0].1.clone().unwrap();
            match stored.get("father") {
                Value::Document(father) => match father.get("father") {
                    Value::Document(grandfather) => {
                        assert_eq!(grandfather.get("name"), Value::from("Steve Doe"))
                    }
                    other => panic!("expected a document, got {:?}", other),
                },
                other => panic!("expected a document, got {:?}", other),
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_remove_and_clear_events() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let seen: Seen = Arc::new(Mutex::new(Vec::new()));
            let subscriber = db.subscribe(listener(&seen))?;

            let user = db.create("User", doc! { name: "John Doe" })?;
            assert!(user.delete()?);
            db.create("User", doc! { name: "Jane Doe" })?;
            db.truncate("User")?;

            wait_for_event(1000, || seen.lock().unwrap().len() == 4);
            let kinds: Vec<StoreEvents> = seen.lock().unwrap().iter().map(|e| e.0).collect();
            assert_eq!(
                kinds,
                vec![
                    StoreEvents::Insert,
                    StoreEvents::Remove,
                    StoreEvents::Insert,
                    StoreEvents::Clear
                ]
            );

            db.unsubscribe(subscriber)?;
            db.create("User", doc! { name: "Jim Doe" })?;
            assert_eq!(seen.lock().unwrap().len(), 4);
            Ok(())
        },
        cleanup,
    )
}
