use nestdoc::common::Value;
use nestdoc::doc;
use nestdoc::errors::{ErrorKind, NestdocError, NestdocResult};
use nestdoc::model::{AfterHook, BeforeHook, Model, ModelEvent, ModelHooks};
use nestdoc_int_test::test_util::{
    cleanup, create_hooked_context, create_test_context, pluck_str, run_test,
};
use std::sync::{Arc, Mutex};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn record(event: ModelEvent, events: &Arc<Mutex<Vec<ModelEvent>>>) -> impl AfterHook {
    let events = events.clone();
    move |_: &Model| -> NestdocResult<()> {
        events.lock().unwrap().push(event);
        Ok(())
    }
}

fn allow(event: ModelEvent, events: &Arc<Mutex<Vec<ModelEvent>>>) -> impl BeforeHook {
    let events = events.clone();
    move |_: &Model| -> NestdocResult<bool> {
        events.lock().unwrap().push(event);
        Ok(true)
    }
}

fn recording_hooks(events: Arc<Mutex<Vec<ModelEvent>>>) -> ModelHooks {
    ModelHooks::new()
        .saving(allow(ModelEvent::Saving, &events))
        .creating(allow(ModelEvent::Creating, &events))
        .updating(allow(ModelEvent::Updating, &events))
        .deleting(allow(ModelEvent::Deleting, &events))
        .created(record(ModelEvent::Created, &events))
        .updated(record(ModelEvent::Updated, &events))
        .saved(record(ModelEvent::Saved, &events))
        .deleted(record(ModelEvent::Deleted, &events))
}

#[test]
fn test_embeds_many_save_events() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let events = Arc::new(Mutex::new(Vec::new()));
            let user = db.create("User", doc! { name: "John Doe" })?;
            let addresses = user
                .embeds_many("addresses")?
                .with_hooks(recording_hooks(events.clone()));

            let address = db.make("Address", doc! { city: "London" })?;
            addresses.save(&address)?;
            assert_eq!(
                *events.lock().unwrap(),
                vec![
                    ModelEvent::Saving,
                    ModelEvent::Creating,
                    ModelEvent::Created,
                    ModelEvent::Saved
                ]
            );

            events.lock().unwrap().clear();
            address.set("city", "Paris")?;
            addresses.save(&address)?;
            assert_eq!(
                *events.lock().unwrap(),
                vec![
                    ModelEvent::Saving,
                    ModelEvent::Updating,
                    ModelEvent::Updated,
                    ModelEvent::Saved
                ]
            );

            events.lock().unwrap().clear();
            addresses.save(&address)?;
            assert_eq!(
                *events.lock().unwrap(),
                vec![ModelEvent::Saving, ModelEvent::Saved]
            );

            events.lock().unwrap().clear();
            assert_eq!(addresses.destroy([&address])?, 1);
            assert_eq!(
                *events.lock().unwrap(),
                vec![ModelEvent::Deleting, ModelEvent::Deleted]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_embeds_many_creating_event_returns_false() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let user = db.create("User", doc! { name: "John Doe" })?;
            let address = db.make("Address", doc! { city: "London" })?;

            let addresses = user
                .embeds_many("addresses")?
                .with_hooks(ModelHooks::new().creating(|_| Ok(false)));
            assert!(addresses.save(&address)?.is_none());
            assert!(!address.exists());
            assert_eq!(addresses.count()?, 0);
            assert!(ctx.find_user(&user)?.many("addresses")?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_embeds_many_saving_event_returns_false() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let user = db.create("User", doc! { name: "John Doe" })?;
            let address = db.make("Address", doc! { city: "Paris" })?;
            address.set_exists(true);

            let addresses = user
                .embeds_many("addresses")?
                .with_hooks(ModelHooks::new().saving(|_| Ok(false)));
            assert!(addresses.save(&address)?.is_none());
            assert_eq!(addresses.count()?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_embeds_many_updating_event_returns_false() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let user = db.create("User", doc! { name: "John Doe" })?;
            let address = db.make("Address", doc! { city: "New York" })?;
            user.embeds_many("addresses")?.save(&address)?;

            let addresses = user
                .embeds_many("addresses")?
                .with_hooks(ModelHooks::new().updating(|_| Ok(false)));
            address.set("city", "Warsaw")?;
            assert!(addresses.save(&address)?.is_none());
            assert!(address.is_dirty());

            let stored = ctx.find_user(&user)?;
            assert_eq!(pluck_str(&stored.many("addresses")?, "city"), vec!["New York"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_embeds_many_deleting_event_returns_false() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let user = db.create("User", doc! { name: "John Doe" })?;
            user.embeds_many("addresses")?
                .save(&db.make("Address", doc! { city: "New York" })?)?;

            let address = user.many("addresses")?.first().unwrap();
            let addresses = user
                .embeds_many("addresses")?
                .with_hooks(ModelHooks::new().deleting(|_| Ok(false)));
            assert_eq!(addresses.destroy([&address])?, 0);
            assert!(address.exists());
            assert_eq!(
                pluck_str(&user.many("addresses")?, "city"),
                vec!["New York"]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_schema_hooks_apply_to_model_save() {
    run_test(
        || {
            create_hooked_context(
                ModelHooks::new().creating(|address: &Model| {
                    Ok(address.get("city") != Value::from("Atlantis"))
                }),
            )
        },
        |ctx| {
            let db = ctx.db();
            let user = db.create("User", doc! { name: "John Doe" })?;
            let addresses = user.embeds_many("addresses")?;

            assert!(addresses.create(doc! { city: "Atlantis" })?.is_none());
            assert!(addresses.create(doc! { city: "Paris" })?.is_some());
            assert_eq!(pluck_str(&user.many("addresses")?, "city"), vec!["Paris"]);

            let atlantis = db.make("Address", doc! { city: "Atlantis" })?;
            addresses.associate(&atlantis)?;
            assert!(!atlantis.save()?);
            assert_eq!(
                pluck_str(&ctx.find_user(&user)?.many("addresses")?, "city"),
                vec!["Paris"]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_hook_error_aborts_save() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let user = db.create("User", doc! { name: "John Doe" })?;
            let addresses = user.embeds_many("addresses")?.with_hooks(
                ModelHooks::new().saving(|_| {
                    Err(NestdocError::new("rejected", ErrorKind::InvalidOperation))
                }),
            );

            let err = addresses.create(doc! { city: "Paris" }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            assert_eq!(addresses.count()?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_embeds_one_hooks() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let events = Arc::new(Mutex::new(Vec::new()));
            let user = db.create("User", doc! { name: "John Doe" })?;
            let father = user
                .embeds_one("father")?
                .with_hooks(recording_hooks(events.clone()));

            father.create(doc! { name: "Mark Doe" })?;
            assert!(father.delete()?);
            assert_eq!(
                *events.lock().unwrap(),
                vec![
                    ModelEvent::Saving,
                    ModelEvent::Creating,
                    ModelEvent::Created,
                    ModelEvent::Saved,
                    ModelEvent::Deleting,
                    ModelEvent::Deleted
                ]
            );
            Ok(())
        },
        cleanup,
    )
}
