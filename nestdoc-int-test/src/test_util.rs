use nestdoc::common::Value;
use nestdoc::errors::NestdocResult;
use nestdoc::model::{Model, ModelCollection, ModelHooks, ModelSchema};
use nestdoc::Nestdoc;
use std::backtrace::Backtrace;
use std::time::Instant;

/// Runs `test` against the context built by `before`, then `after`, which
/// also runs when the test returns an error. Panics with the collected
/// details when any step fails.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> NestdocResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> NestdocResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> NestdocResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();

    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        match before() {
            Ok(ctx) => match test(ctx.clone()) {
                Ok(_) => after(ctx).map_err(|e| {
                    (format!("After run failed: {:?}", e), backtrace.to_string())
                }),
                Err(e) => {
                    let _ = after(ctx);
                    Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                }
            },
            Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        }
    });

    let elapsed = start_time.elapsed();
    let (error, backtrace) = match result {
        Ok(Ok(_)) => return,
        Ok(Err((e, bt))) => (e, bt),
        Err(panic_err) => {
            let message = if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            (format!("Panic: {}", message), String::new())
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", elapsed);
    eprintln!("Error: {}", error);
    if !backtrace.is_empty() && !backtrace.contains("disabled") {
        eprintln!("\nBacktrace:\n{}", backtrace);
    }
    eprintln!("=====================================================\n");

    panic!("Test failed. Last error: {}", error);
}

#[derive(Clone)]
pub struct TestContext {
    db: Nestdoc,
}

impl TestContext {
    pub fn new(db: Nestdoc) -> Self {
        Self { db }
    }

    pub fn db(&self) -> Nestdoc {
        self.db.clone()
    }

    /// Reloads a top-level user by identifier.
    pub fn find_user(&self, user: &Model) -> NestdocResult<Model> {
        let id = user.id().unwrap_or_default();
        match self.db.find("User", &id)? {
            Some(user) => Ok(user),
            None => panic!("user {} is not stored", id),
        }
    }

    /// First stored user with the given name.
    pub fn user_named(&self, name: &str) -> NestdocResult<Model> {
        match self.db.query("User")?.where_eq("name", name).first()? {
            Some(user) => Ok(user),
            None => panic!("no user named {}", name),
        }
    }
}

/// `User` embeds many `Address` under `_addresses` and one `User` as
/// `father`; `Address` embeds many `Address`.
pub fn user_schema() -> ModelSchema {
    ModelSchema::new("User")
        .embeds_many_with_key("addresses", "Address", "_addresses")
        .embeds_one("father", "User")
}

pub fn address_schema() -> ModelSchema {
    ModelSchema::new("Address").embeds_many("addresses", "Address")
}

pub fn create_test_context() -> NestdocResult<TestContext> {
    let db = Nestdoc::builder()
        .register(user_schema())
        .register(address_schema())
        .open()?;
    Ok(TestContext::new(db))
}

/// Same fixtures, with `hooks` as the default hooks of `Address`.
pub fn create_hooked_context(hooks: ModelHooks) -> NestdocResult<TestContext> {
    let db = Nestdoc::builder()
        .register(user_schema())
        .register(address_schema().hooks(hooks))
        .open()?;
    Ok(TestContext::new(db))
}

pub fn cleanup(ctx: TestContext) -> NestdocResult<()> {
    let db = ctx.db();
    if db.is_closed()? {
        return Ok(());
    }
    db.truncate("User")?;
    db.truncate("Address")?;
    db.close()
}

/// Values of `field` across the collection, as strings.
pub fn pluck_str(models: &ModelCollection, field: &str) -> Vec<String> {
    models
        .pluck(field)
        .into_iter()
        .map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect()
}
