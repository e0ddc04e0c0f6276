use crate::errors::{NestdocError, NestdocResult};
use crate::model::ModelSchema;
use crate::nestdoc::Nestdoc;
use crate::nestdoc_config::NestdocConfig;
use crate::store::StoreProvider;

/// Fluent builder for [Nestdoc].
///
/// The first failing step is remembered and returned by
/// [NestdocBuilder::open]; later steps are skipped.
///
/// ```ignore
/// let db = Nestdoc::builder()
///     .register(ModelSchema::new("User").embeds_many("addresses", "Address"))
///     .register(ModelSchema::new("Address"))
///     .open()?;
/// ```
#[derive(Default)]
pub struct NestdocBuilder {
    error: Option<NestdocError>,
    config: NestdocConfig,
}

impl NestdocBuilder {
    pub fn new() -> Self {
        NestdocBuilder {
            error: None,
            config: NestdocConfig::new(),
        }
    }

    pub fn register(mut self, schema: ModelSchema) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.register_schema(schema) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn store<T: StoreProvider + 'static>(mut self, provider: T) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_store(provider) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Validates the schemas, opens the store and returns the database.
    pub fn open(self) -> NestdocResult<Nestdoc> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.initialize()?;
        Nestdoc::new(self.config)
    }
}
