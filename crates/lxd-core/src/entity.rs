//! Lazily fetched API objects.
//!
//! A [`LazyEntity`] is either an unresolved reference to an object on the daemon or the
//! object itself. Fetching is always explicit: reading data from an unresolved entity fails
//! with [`Error::NotFetched`] instead of going to the network behind the caller's back.
//!
//! State only changes after a complete reply has been validated, so a failed or cancelled
//! fetch leaves the entity exactly as it was.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::{Error, Result};
use crate::path::ApiPath;
use crate::query::QueryParams;
use crate::response::Response;
use crate::transport::Transport;

/// Schema of an object the daemon returns.
pub trait Entity: DeserializeOwned + Validate + fmt::Debug + Send + Sync {
    /// Name used in errors and debug output.
    const KIND: &'static str;

    /// Canonical reference for an already-known object, used to refresh entities that were
    /// filled from embedded data.
    fn operation_for(&self, _root: &ApiPath) -> Option<ApiPath> {
        None
    }
}

/// The two states of a [`LazyEntity`].
#[derive(Debug, Clone, PartialEq)]
pub enum EntityState<S> {
    /// Only the reference is known.
    Unresolved(ApiPath),
    /// Full, validated data is present.
    Resolved(S),
}

/// An API object that may not have been fetched yet.
#[derive(Clone)]
pub struct LazyEntity<S> {
    transport: Transport,
    operation: Option<ApiPath>,
    state: EntityState<S>,
}

impl<S: Entity> LazyEntity<S> {
    /// Create an unresolved entity pointing at `operation`.
    #[must_use]
    pub fn unresolved(transport: Transport, operation: ApiPath) -> Self {
        Self {
            transport,
            operation: Some(operation.clone()),
            state: EntityState::Unresolved(operation),
        }
    }

    /// Create an unresolved entity from a daemon reference string such as
    /// `/1.0/instances/web`.
    #[must_use]
    pub fn from_reference(transport: Transport, reference: impl AsRef<str>) -> Self {
        let operation = transport.resolve(reference);
        Self::unresolved(transport, operation)
    }

    /// Create a resolved entity from an embedded object without any network call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `raw` does not match the schema.
    pub fn from_object(transport: Transport, raw: Map<String, Value>) -> Result<Self> {
        let data = validate::<S>(raw)?;
        let operation = data.operation_for(transport.root());
        Ok(Self {
            transport,
            operation,
            state: EntityState::Resolved(data),
        })
    }

    /// Wrap the array metadata of a collection listing.
    ///
    /// Without recursion each item must be a reference string and becomes an unresolved
    /// entity; with recursion each item must be an object and becomes a resolved entity.
    /// Source order is kept and no further requests are made.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedShape`] if an item has the wrong JSON type, or
    /// [`Error::Validation`] if an embedded object does not match the schema.
    pub fn from_listing(
        transport: &Transport,
        items: Vec<Value>,
        recursion: bool,
    ) -> Result<Vec<Self>> {
        items
            .into_iter()
            .map(|item| match (recursion, item) {
                (false, Value::String(reference)) => {
                    Ok(Self::from_reference(transport.clone(), reference))
                }
                (true, Value::Object(raw)) => Self::from_object(transport.clone(), raw),
                (false, other) => Err(Error::UnexpectedShape {
                    expected: "string",
                    found: json_shape(&other),
                }),
                (true, other) => Err(Error::UnexpectedShape {
                    expected: "object",
                    found: json_shape(&other),
                }),
            })
            .collect()
    }

    /// Operation reference, if known.
    #[must_use]
    pub const fn operation(&self) -> Option<&ApiPath> {
        self.operation.as_ref()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &EntityState<S> {
        &self.state
    }

    /// True once data is present.
    #[must_use]
    pub const fn is_fetched(&self) -> bool {
        matches!(self.state, EntityState::Resolved(_))
    }

    /// Borrow the data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFetched`] while the entity is unresolved.
    pub fn data(&self) -> Result<&S> {
        match &self.state {
            EntityState::Resolved(data) => Ok(data),
            EntityState::Unresolved(operation) => Err(Error::NotFetched {
                entity: S::KIND,
                operation: operation.path().to_string(),
            }),
        }
    }

    /// Take the data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFetched`] while the entity is unresolved.
    pub fn into_data(self) -> Result<S> {
        match self.state {
            EntityState::Resolved(data) => Ok(data),
            EntityState::Unresolved(operation) => Err(Error::NotFetched {
                entity: S::KIND,
                operation: operation.path().to_string(),
            }),
        }
    }

    /// Set the data from an already available object. No network call is made.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `raw` does not match the schema; the entity is left
    /// unchanged in that case.
    pub fn fill(&mut self, raw: Map<String, Value>) -> Result<()> {
        let data = validate::<S>(raw)?;
        debug!(entity = S::KIND, "Filled entity from embedded data");
        self.resolve_with(data);
        Ok(())
    }

    /// Fetch the data unless it is already present.
    ///
    /// # Errors
    ///
    /// See [`LazyEntity::update`].
    pub async fn fetch(&mut self) -> Result<&S> {
        if !self.is_fetched() {
            self.update().await?;
        }
        self.data()
    }

    /// Fetch the data from the daemon, replacing whatever is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationMissing`] without a reference, [`Error::UnexpectedShape`] if
    /// the reply's metadata is not an object, [`Error::Validation`] on schema mismatch, or
    /// any transport error.
    pub async fn update(&mut self) -> Result<&S> {
        let operation = self.operation.clone().ok_or(Error::OperationMissing(S::KIND))?;

        debug!(entity = S::KIND, operation = %operation.path(), "Fetching entity");
        let response = self.transport.get(&operation, &QueryParams::new()).await?;
        let raw = match response {
            Response::Error(err) => return Err(err.into()),
            other => other.into_metadata().into_object()?,
        };
        let data = validate::<S>(raw)?;

        self.resolve_with(data);
        self.data()
    }

    fn resolve_with(&mut self, data: S) {
        if self.operation.is_none() {
            self.operation = data.operation_for(self.transport.root());
        }
        self.state = EntityState::Resolved(data);
    }
}

impl<S: fmt::Debug> fmt::Debug for LazyEntity<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyEntity")
            .field("operation", &self.operation)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S: Entity> fmt::Display for LazyEntity<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            EntityState::Resolved(data) => write!(f, "{}({data:?})", S::KIND),
            EntityState::Unresolved(operation) => {
                write!(f, "{}(Unfetched {})", S::KIND, operation.path())
            }
        }
    }
}

/// Deserialize and validate `raw` against `S`.
fn validate<S: Entity>(raw: Map<String, Value>) -> Result<S> {
    let data: S = serde_path_to_error::deserialize(Value::Object(raw)).map_err(|err| {
        let field = serde_field(&err);
        Error::Validation {
            entity: S::KIND,
            field,
            message: err.into_inner().to_string(),
        }
    })?;

    data.validate().map_err(|errors| Error::Validation {
        entity: S::KIND,
        field: first_invalid_field(&errors),
        message: errors.to_string(),
    })?;

    Ok(data)
}

/// Dotted path of the failing field. A missing field is reported by serde on the enclosing
/// object, so its name is taken from the message (``missing field `name` ``).
fn serde_field(err: &serde_path_to_error::Error<serde_json::Error>) -> String {
    let message = err.inner().to_string();
    let named = message
        .split('`')
        .nth(1)
        .filter(|_| message.contains("field `"));

    let path = err.path().to_string();
    match (path.as_str(), named) {
        ("." | "", Some(name)) => name.to_string(),
        ("." | "", None) => "$".to_string(),
        (path, Some(name)) if message.starts_with("missing field") => format!("{path}.{name}"),
        (path, _) => path.to_string(),
    }
}

fn first_invalid_field(errors: &ValidationErrors) -> String {
    let mut fields: Vec<(String, &ValidationErrorsKind)> = errors
        .errors()
        .iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let Some((name, kind)) = fields.into_iter().next() else {
        return "$".to_string();
    };
    match kind {
        ValidationErrorsKind::Field(_) => name,
        ValidationErrorsKind::Struct(inner) => format!("{name}.{}", first_invalid_field(inner)),
        ValidationErrorsKind::List(items) => match items.iter().next() {
            Some((index, inner)) => format!("{name}[{index}].{}", first_invalid_field(inner)),
            None => name,
        },
    }
}

fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{HttpBackend, MockHttpBackend, RawResponse};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const BASE: &str = "https://lxd.test:8443";

    #[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
    struct Widget {
        #[validate(length(min = 1))]
        name: String,
        size: u32,
    }

    impl Entity for Widget {
        const KIND: &'static str = "Widget";

        fn operation_for(&self, root: &ApiPath) -> Option<ApiPath> {
            Some(root.child("widgets").child(&self.name))
        }
    }

    fn sync_reply(metadata: Value) -> RawResponse {
        RawResponse {
            status: 200,
            reason: "OK".to_string(),
            content_type: Some("application/json".to_string()),
            body: serde_json::to_vec(&json!({
                "type": "sync",
                "status": "Success",
                "status_code": 200,
                "metadata": metadata
            }))
            .unwrap(),
        }
    }

    fn transport(mock: MockHttpBackend) -> Transport {
        Transport::with_backend(BASE, Arc::new(mock)).unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn fetch_resolves_unresolved_entity() {
        let mut mock = MockHttpBackend::new();
        mock.expect_send()
            .withf(|_, url, _| url.path() == "/1.0/widgets/a")
            .times(1)
            .returning(|_, _, _| Ok(sync_reply(json!({"name": "a", "size": 3}))));

        let mut entity = LazyEntity::<Widget>::from_reference(transport(mock), "/1.0/widgets/a");
        assert!(!entity.is_fetched());
        assert_eq!(entity.to_string(), "Widget(Unfetched /1.0/widgets/a)");

        let data = entity.fetch().await.unwrap();
        assert_eq!(data.size, 3);
        assert!(entity.is_fetched());

        // Second fetch is a no-op: the mock allows exactly one call.
        entity.fetch().await.unwrap();
    }

    #[tokio::test]
    async fn update_always_refetches() {
        let mut mock = MockHttpBackend::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(sync_reply(json!({"name": "a", "size": 1}))));
        mock.expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(sync_reply(json!({"name": "a", "size": 2}))));

        let mut entity = LazyEntity::<Widget>::from_reference(transport(mock), "/1.0/widgets/a");
        assert_eq!(entity.fetch().await.unwrap().size, 1);
        assert_eq!(entity.update().await.unwrap().size, 2);
    }

    #[tokio::test]
    async fn fill_then_fetch_makes_no_request() {
        let mut mock = MockHttpBackend::new();
        mock.expect_send().never();

        let mut entity = LazyEntity::<Widget>::from_object(
            transport(mock),
            object(json!({"name": "b", "size": 7})),
        )
        .unwrap();
        assert_eq!(entity.fetch().await.unwrap().size, 7);
        assert_eq!(
            entity.operation().map(ApiPath::path),
            Some("/1.0/widgets/b")
        );
    }

    #[test]
    fn data_on_unresolved_entity_fails() {
        let entity =
            LazyEntity::<Widget>::from_reference(transport(MockHttpBackend::new()), "/1.0/widgets/a");
        assert_eq!(
            entity.data().unwrap_err(),
            Error::NotFetched {
                entity: "Widget",
                operation: "/1.0/widgets/a".to_string()
            }
        );
        assert!(entity.into_data().is_err());
    }

    #[tokio::test]
    async fn fetch_rejects_array_metadata() {
        let mut mock = MockHttpBackend::new();
        mock.expect_send()
            .returning(|_, _, _| Ok(sync_reply(json!(["/1.0/widgets/a"]))));

        let mut entity = LazyEntity::<Widget>::from_reference(transport(mock), "/1.0/widgets/a");
        let err = entity.fetch().await.unwrap_err();
        assert_eq!(
            err,
            Error::UnexpectedShape {
                expected: "object",
                found: "array"
            }
        );
        assert!(!entity.is_fetched());
    }

    #[tokio::test]
    async fn fetch_surfaces_error_envelope() {
        let mut mock = MockHttpBackend::new();
        mock.expect_send().returning(|_, _, _| {
            Ok(RawResponse {
                status: 404,
                reason: "Not Found".to_string(),
                content_type: Some("application/json".to_string()),
                body: serde_json::to_vec(&json!({
                    "type": "error",
                    "error": "not found",
                    "error_code": 404
                }))
                .unwrap(),
            })
        });

        let mut entity = LazyEntity::<Widget>::from_reference(transport(mock), "/1.0/widgets/x");
        let err = entity.fetch().await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!entity.is_fetched());
    }

    #[tokio::test]
    async fn failed_update_keeps_previous_data() {
        let mut mock = MockHttpBackend::new();
        mock.expect_send()
            .returning(|_, _, _| Ok(sync_reply(json!({"name": "a", "size": "big"}))));

        let mut entity = LazyEntity::<Widget>::from_object(
            transport(mock),
            object(json!({"name": "a", "size": 1})),
        )
        .unwrap();
        let err = entity.update().await.unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "size"));
        assert_eq!(entity.data().unwrap().size, 1);
    }

    #[test]
    fn fill_reports_offending_field() {
        let mut entity =
            LazyEntity::<Widget>::from_reference(transport(MockHttpBackend::new()), "/1.0/widgets/a");

        let err = entity.fill(object(json!({"size": 1}))).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "name"));

        let err = entity.fill(object(json!({"name": "", "size": 1}))).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "name"));

        let err = entity.fill(object(json!({"name": "a", "size": "big"}))).unwrap_err();
        assert_eq!(
            err,
            Error::Validation {
                entity: "Widget",
                field: "size".to_string(),
                message: "invalid type: string \"big\", expected u32".to_string(),
            }
        );

        let err = entity.fill(object(json!({"name": 7, "size": 1}))).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "name"));

        assert!(!entity.is_fetched());
        entity.fill(object(json!({"name": "a", "size": 1}))).unwrap();
        assert!(entity.is_fetched());
        assert_eq!(entity.operation().map(ApiPath::path), Some("/1.0/widgets/a"));
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Assembly {
        #[validate(nested)]
        main: Widget,
    }

    impl Entity for Assembly {
        const KIND: &'static str = "Assembly";
    }

    #[test]
    fn fill_reports_nested_field_path() {
        let mut entity = LazyEntity::<Assembly>::from_reference(
            transport(MockHttpBackend::new()),
            "/1.0/assemblies/a",
        );

        let err = entity
            .fill(object(json!({"main": {"name": "a", "size": "big"}})))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "main.size"));

        let err = entity.fill(object(json!({"main": {"size": 1}}))).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "main.name"));

        let err = entity
            .fill(object(json!({"main": {"name": "", "size": 1}})))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "main.name"));
        assert!(!entity.is_fetched());
    }

    struct StalledBackend;

    #[async_trait::async_trait]
    impl HttpBackend for StalledBackend {
        async fn send(
            &self,
            _method: reqwest::Method,
            _url: url::Url,
            _body: Option<Value>,
        ) -> Result<RawResponse> {
            std::future::pending().await
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn abandoned_fetch_leaves_entity_unresolved() {
        let transport = Transport::with_backend(BASE, Arc::new(StalledBackend)).unwrap();
        let mut entity = LazyEntity::<Widget>::from_reference(transport, "/1.0/widgets/a");

        let elapsed = tokio::time::timeout(Duration::from_millis(20), entity.fetch())
            .await
            .is_err();
        assert!(elapsed);

        assert!(!entity.is_fetched());
        assert!(matches!(
            entity.state(),
            EntityState::Unresolved(path) if path.path() == "/1.0/widgets/a"
        ));
        assert_eq!(entity.operation().map(ApiPath::path), Some("/1.0/widgets/a"));
    }

    #[tokio::test]
    async fn update_without_operation_fails() {
        #[derive(Debug, Deserialize, Validate)]
        struct Anonymous {
            value: u8,
        }
        impl Entity for Anonymous {
            const KIND: &'static str = "Anonymous";
        }

        let mut mock = MockHttpBackend::new();
        mock.expect_send().never();
        let mut entity =
            LazyEntity::<Anonymous>::from_object(transport(mock), object(json!({"value": 1})))
                .unwrap();
        assert!(entity.operation().is_none());
        assert_eq!(entity.data().unwrap().value, 1);
        assert_eq!(
            entity.update().await.unwrap_err(),
            Error::OperationMissing("Anonymous")
        );
    }

    #[test]
    fn listing_without_recursion_yields_unresolved_in_order() {
        let transport = transport(MockHttpBackend::new());
        let entities = LazyEntity::<Widget>::from_listing(
            &transport,
            vec![json!("/1.0/widgets/a"), json!("/1.0/widgets/b")],
            false,
        )
        .unwrap();

        assert_eq!(entities.len(), 2);
        assert!(entities.iter().all(|e| !e.is_fetched()));
        let refs: Vec<&str> = entities
            .iter()
            .filter_map(|e| e.operation().map(ApiPath::path))
            .collect();
        assert_eq!(refs, vec!["/1.0/widgets/a", "/1.0/widgets/b"]);
    }

    #[test]
    fn listing_with_recursion_yields_resolved() {
        let mut mock = MockHttpBackend::new();
        mock.expect_send().never();
        let transport = transport(mock);

        let entities = LazyEntity::<Widget>::from_listing(
            &transport,
            vec![json!({"name": "a", "size": 1}), json!({"name": "b", "size": 2})],
            true,
        )
        .unwrap();

        let data: Vec<Widget> = entities.into_iter().map(|e| e.into_data().unwrap()).collect();
        assert_eq!(
            data,
            vec![
                Widget { name: "a".to_string(), size: 1 },
                Widget { name: "b".to_string(), size: 2 },
            ]
        );
    }

    #[test]
    fn listing_rejects_mismatched_items() {
        let transport = transport(MockHttpBackend::new());
        let err = LazyEntity::<Widget>::from_listing(&transport, vec![json!({"name": "a"})], false)
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnexpectedShape {
                expected: "string",
                found: "object"
            }
        );

        let err = LazyEntity::<Widget>::from_listing(&transport, vec![json!("/1.0/widgets/a")], true)
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnexpectedShape {
                expected: "object",
                found: "string"
            }
        );
    }
}
