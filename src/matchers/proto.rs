//! Structural equality of protobuf messages.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use super::format::{message, message_with_diff};
use super::{Inspect, MatchError, Matcher, Subject};
use crate::generated::{config, provider};

/// Object-safe view of a protobuf message.
pub trait ProtoMessage: fmt::Debug + Send + Sync + 'static {
    /// Fully qualified message name, such as `indykite.config.v1.Customer`.
    fn message_name(&self) -> String;

    /// Type URL used when packing the message into an `Any`.
    fn message_type_url(&self) -> String;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Field-by-field equality with another message of any type.
    fn dyn_eq(&self, other: &dyn ProtoMessage) -> bool;

    /// Pack the message into an `Any`.
    fn to_any(&self) -> prost_types::Any;
}

impl<M> ProtoMessage for M
where
    M: prost::Message + prost::Name + PartialEq + fmt::Debug + 'static,
{
    fn message_name(&self) -> String {
        <M as prost::Name>::full_name()
    }

    fn message_type_url(&self) -> String {
        <M as prost::Name>::type_url()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn ProtoMessage) -> bool {
        other
            .as_any()
            .downcast_ref::<M>()
            .is_some_and(|other| other == self)
    }

    fn to_any(&self) -> prost_types::Any {
        prost_types::Any {
            type_url: <M as prost::Name>::type_url(),
            value: self.encode_to_vec(),
        }
    }
}

crate::impl_inspect_message!(prost_types::Any, prost_types::Timestamp);

crate::impl_inspect_message!(
    config::Customer,
    config::DbConnection,
    config::ApplicationSpace,
    config::CreateApplicationSpaceRequest,
    config::UpdateApplicationSpaceRequest,
    config::ListApplicationSpacesResponse,
    config::Application,
    config::CreateApplicationRequest,
    config::UpdateApplicationRequest,
    config::ListApplicationsResponse,
    config::ApplicationAgent,
    config::CreateApplicationAgentRequest,
    config::UpdateApplicationAgentRequest,
    config::ListApplicationAgentsResponse,
    config::ApplicationAgentCredential,
    config::CreateApplicationAgentCredentialRequest,
    config::AuthorizationPolicy,
    config::CreateAuthorizationPolicyRequest,
    config::UpdateAuthorizationPolicyRequest,
    provider::Diagnostic,
    provider::Attribute,
    provider::NestedBlock,
    provider::Block,
    provider::Schema,
    provider::AttributeChange,
    provider::ImportedResource,
    provider::GetSchemaResponse,
    provider::PlanRequest,
    provider::PlanResponse,
);

type Decoder = fn(&[u8]) -> Result<Box<dyn ProtoMessage>, prost::DecodeError>;

fn decode_boxed<M>(bytes: &[u8]) -> Result<Box<dyn ProtoMessage>, prost::DecodeError>
where
    M: prost::Message + prost::Name + Default + PartialEq + fmt::Debug + 'static,
{
    Ok(Box::new(M::decode(bytes)?))
}

/// Strip the host part of a type URL, leaving the message name.
fn message_name_of(type_url: &str) -> &str {
    type_url
        .rsplit_once('/')
        .map_or(type_url, |(_, name)| name)
}

/// Maps message names to decoders so `Any` payloads can be unpacked.
#[derive(Default, Clone)]
pub struct TypeRegistry {
    decoders: HashMap<String, Decoder>,
}

static GENERATED: LazyLock<Arc<TypeRegistry>> = LazyLock::new(|| {
    Arc::new(
        TypeRegistry::new()
            .with::<prost_types::Timestamp>()
            .with::<config::Customer>()
            .with::<config::DbConnection>()
            .with::<config::ApplicationSpace>()
            .with::<config::CreateApplicationSpaceRequest>()
            .with::<config::UpdateApplicationSpaceRequest>()
            .with::<config::ListApplicationSpacesResponse>()
            .with::<config::Application>()
            .with::<config::CreateApplicationRequest>()
            .with::<config::UpdateApplicationRequest>()
            .with::<config::ListApplicationsResponse>()
            .with::<config::ApplicationAgent>()
            .with::<config::CreateApplicationAgentRequest>()
            .with::<config::UpdateApplicationAgentRequest>()
            .with::<config::ListApplicationAgentsResponse>()
            .with::<config::ApplicationAgentCredential>()
            .with::<config::CreateApplicationAgentCredentialRequest>()
            .with::<config::AuthorizationPolicy>()
            .with::<config::CreateAuthorizationPolicyRequest>()
            .with::<config::UpdateAuthorizationPolicyRequest>()
            .with::<provider::Diagnostic>()
            .with::<provider::Attribute>()
            .with::<provider::NestedBlock>()
            .with::<provider::Block>()
            .with::<provider::Schema>()
            .with::<provider::AttributeChange>()
            .with::<provider::ImportedResource>()
            .with::<provider::GetSchemaResponse>()
            .with::<provider::PlanRequest>()
            .with::<provider::PlanResponse>(),
    )
});

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every message compiled into this crate.
    pub fn generated() -> Arc<Self> {
        Arc::clone(&GENERATED)
    }

    /// Register a message type.
    pub fn register<M>(&mut self) -> &mut Self
    where
        M: prost::Message + prost::Name + Default + PartialEq + fmt::Debug + 'static,
    {
        self.decoders
            .insert(<M as prost::Name>::full_name(), decode_boxed::<M>);
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<M>(mut self) -> Self
    where
        M: prost::Message + prost::Name + Default + PartialEq + fmt::Debug + 'static,
    {
        self.register::<M>();
        self
    }

    /// Whether a decoder is known for the type URL.
    pub fn contains(&self, type_url: &str) -> bool {
        self.decoders.contains_key(message_name_of(type_url))
    }

    /// Unpack an `Any` into its concrete message.
    pub fn decode(&self, any: &prost_types::Any) -> Result<Box<dyn ProtoMessage>, MatchError> {
        let decoder = self
            .decoders
            .get(message_name_of(&any.type_url))
            .ok_or_else(|| MatchError::UnregisteredType(any.type_url.clone()))?;
        decoder(&any.value).map_err(|source| MatchError::Decode {
            type_url: any.type_url.clone(),
            source,
        })
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

/// Matches protobuf messages equal to an expected one.
///
/// Equality is structural over typed fields, so map fields compare equal
/// regardless of insertion order. An `Any` subject is unpacked through the
/// [`TypeRegistry`] before comparing. Comparing an absent subject with an
/// absent expectation is an error.
#[derive(Debug, Clone)]
pub struct EqualProto<E> {
    expected: Option<E>,
    registry: Arc<TypeRegistry>,
}

/// Match messages equal to `expected`.
pub fn equal_proto<E: ProtoMessage>(expected: E) -> EqualProto<E> {
    EqualProto::new(Some(expected))
}

impl<E: ProtoMessage> EqualProto<E> {
    /// Create the matcher. `None` expects an absent message.
    pub fn new(expected: Option<E>) -> Self {
        Self {
            expected,
            registry: TypeRegistry::generated(),
        }
    }

    /// Use a custom registry for unpacking `Any` subjects.
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// The expected message.
    pub fn expected(&self) -> Option<&E> {
        self.expected.as_ref()
    }

    fn render_expected(&self) -> String {
        match &self.expected {
            Some(expected) => format!("{:#?}", expected),
            None => "<nil>".to_string(),
        }
    }

    /// Unpack `Any` subjects unless the expectation is an `Any` itself.
    fn unpack(
        &self,
        subject: &dyn ProtoMessage,
    ) -> Result<Option<Box<dyn ProtoMessage>>, MatchError> {
        let expects_any = self
            .expected
            .as_ref()
            .is_some_and(|e| e.as_any().is::<prost_types::Any>());
        match subject.as_any().downcast_ref::<prost_types::Any>() {
            Some(any) if !expects_any => self.registry.decode(any).map(Some),
            _ => Ok(None),
        }
    }

    fn render_message(&self, subject: &dyn ProtoMessage) -> String {
        match self.unpack(subject) {
            Ok(Some(inner)) => format!("{:#?}", inner),
            _ => format!("{:#?}", subject),
        }
    }

    fn failure(&self, actual: Subject<'_>, verb: &str) -> String {
        match actual {
            Subject::Message(subject) => {
                message_with_diff(&self.render_message(subject), verb, &self.render_expected())
            },
            other => {
                let expected = match &self.expected {
                    Some(expected) => Subject::Message(expected).render(),
                    None => Subject::Nil.render(),
                };
                message(&other.render(), verb, &expected)
            },
        }
    }
}

impl<E, T> Matcher<T> for EqualProto<E>
where
    E: ProtoMessage,
    T: Inspect + ?Sized,
{
    fn matches(&self, actual: &T) -> Result<bool, MatchError> {
        match actual.inspect() {
            Subject::Nil => match self.expected {
                None => Err(MatchError::NilComparison),
                Some(_) => Ok(false),
            },
            Subject::Message(subject) => {
                let Some(expected) = &self.expected else {
                    return Ok(false);
                };
                Ok(match self.unpack(subject)? {
                    Some(inner) => inner.dyn_eq(expected),
                    None => subject.dyn_eq(expected),
                })
            },
            other => Err(MatchError::UnexpectedType {
                matcher: "EqualProto",
                expected: "a protobuf message",
                actual: other.render(),
            }),
        }
    }

    fn failure_message(&self, actual: &T) -> String {
        self.failure(actual.inspect(), "to equal")
    }

    fn negated_failure_message(&self, actual: &T) -> String {
        self.failure(actual.inspect(), "not to equal")
    }

    fn description(&self) -> String {
        self.render_expected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generated::config::{Application, ApplicationSpace, DbConnection};
    use crate::generated::provider::{Block, GetSchemaResponse, Schema};

    fn app_space() -> ApplicationSpace {
        ApplicationSpace {
            id: "gid:AAAAAmluZHlraURlgAABDwAAAAA".to_string(),
            name: "acme".to_string(),
            region: "europe-west1".to_string(),
            db_connection: Some(DbConnection {
                url: "neo4j://db".to_string(),
                username: "neo4j".to_string(),
                password: "secret".to_string(),
                name: String::new(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_equal_messages_match() {
        let matcher = equal_proto(app_space());
        assert!(matcher.matches(&app_space()).unwrap());
    }

    #[test]
    fn test_differing_messages_render_both() {
        let matcher = equal_proto(app_space());
        let mut actual = app_space();
        actual.region = "us-east1".to_string();

        assert!(!matcher.matches(&actual).unwrap());
        let text = matcher.failure_message(&actual);
        assert!(text.contains("us-east1"));
        assert!(text.contains("europe-west1"));
        assert!(text.contains("to equal"));
        assert!(text.contains("Difference"));
    }

    #[test]
    fn test_nil_handling() {
        let nil_matcher: EqualProto<ApplicationSpace> = EqualProto::new(None);
        let none: Option<ApplicationSpace> = None;
        assert!(matches!(
            nil_matcher.matches(&none),
            Err(MatchError::NilComparison)
        ));

        let matcher = equal_proto(app_space());
        assert!(!matcher.matches(&none).unwrap());
        assert!(!nil_matcher.matches(&Some(app_space())).unwrap());
    }

    #[test]
    fn test_different_message_type_is_not_equal() {
        let matcher = equal_proto(app_space());
        let application = Application {
            id: "gid:AAAAAmluZHlraURlgAABDwAAAAA".to_string(),
            ..Default::default()
        };
        assert!(!matcher.matches(&application).unwrap());
    }

    #[test]
    fn test_unpacks_any() {
        let matcher = equal_proto(app_space());
        assert!(matcher.matches(&app_space().to_any()).unwrap());

        let other = Application::default().to_any();
        assert!(!matcher.matches(&other).unwrap());
    }

    #[test]
    fn test_any_errors() {
        let matcher = equal_proto(app_space());

        let unregistered = prost_types::Any {
            type_url: "type.googleapis.com/indykite.config.v1.Unknown".to_string(),
            value: vec![],
        };
        assert!(matches!(
            matcher.matches(&unregistered),
            Err(MatchError::UnregisteredType(_))
        ));

        let corrupt = prost_types::Any {
            type_url: "type.googleapis.com/indykite.config.v1.ApplicationSpace".to_string(),
            value: vec![0x0a, 0xff],
        };
        assert!(matches!(
            matcher.matches(&corrupt),
            Err(MatchError::Decode { .. })
        ));
    }

    #[test]
    fn test_custom_registry() {
        let registry = Arc::new(TypeRegistry::new().with::<Application>());
        let matcher = equal_proto(app_space()).with_registry(registry);
        assert!(matches!(
            matcher.matches(&app_space().to_any()),
            Err(MatchError::UnregisteredType(_))
        ));
    }

    #[test]
    fn test_non_message_is_type_error() {
        let matcher = equal_proto(app_space());
        let err = matcher.matches("acme").unwrap_err();
        assert!(err.to_string().contains("expects a protobuf message"));

        let text = matcher.failure_message("acme");
        assert!(text.starts_with("Expected\n    <string>: \"acme\"\nto equal"));
        assert!(text.contains("indykite.config.v1.ApplicationSpace"));
    }

    #[test]
    fn test_description_renders_expected() {
        let matcher = equal_proto(app_space());
        let description = Matcher::<ApplicationSpace>::description(&matcher);
        assert!(description.contains("europe-west1"));
        assert!(description.starts_with("ApplicationSpace {"));
    }

    fn schema_response(names: &[&str]) -> GetSchemaResponse {
        let mut response = GetSchemaResponse::default();
        for name in names {
            let schema = Schema {
                version: 0,
                block: Some(Block {
                    description: format!("{} schema", name),
                    ..Default::default()
                }),
            };
            response.resources.insert(name.to_string(), schema.clone());
            response.data_sources.insert(name.to_string(), schema);
        }
        response
    }

    const RESOURCE_NAMES: [&str; 8] = [
        "indykite_application",
        "indykite_application_agent",
        "indykite_application_agent_credential",
        "indykite_application_space",
        "indykite_authorization_policy",
        "indykite_customer",
        "indykite_applications",
        "indykite_application_spaces",
    ];

    #[test]
    fn test_map_fields_render_in_key_order() {
        let mut reversed = RESOURCE_NAMES;
        reversed.reverse();
        let expected = schema_response(&RESOURCE_NAMES);
        let actual = schema_response(&reversed);

        let matcher = equal_proto(expected.clone());
        let other = equal_proto(actual.clone());
        assert_eq!(
            Matcher::<GetSchemaResponse>::description(&matcher),
            Matcher::<GetSchemaResponse>::description(&other)
        );

        assert!(matcher.matches(&actual).unwrap());
        let text = matcher.negated_failure_message(&actual);
        assert!(text.contains("not to equal"));
        assert!(!text.contains("Difference"));
    }

    #[test]
    fn test_negated_failure_message() {
        let matcher = equal_proto(app_space());
        let text = matcher.negated_failure_message(&app_space());
        assert!(text.starts_with("Expected\n    ApplicationSpace {"));
        assert!(text.contains("\nnot to equal\n"));
        assert!(!text.contains("Difference"));

        let mut actual = app_space();
        actual.name = "acme-2".to_string();
        let text = matcher.negated_failure_message(&actual);
        assert!(text.contains("not to equal"));
        assert!(text.contains("Difference (- expected, + actual):"));
        assert!(text.contains("+    name: \"acme-2\","));
        assert!(text.contains("-    name: \"acme\","));
    }

    #[test]
    fn test_description_of_absent_expectation() {
        let matcher: EqualProto<ApplicationSpace> = EqualProto::new(None);
        assert_eq!(Matcher::<ApplicationSpace>::description(&matcher), "<nil>");
        assert!(matcher
            .failure_message(&app_space())
            .contains("\nto equal\n    <nil>"));
    }

    #[test]
    fn test_registry_lookup_ignores_host() {
        let registry = TypeRegistry::generated();
        assert!(registry.contains("type.googleapis.com/indykite.config.v1.Customer"));
        assert!(registry.contains("/indykite.config.v1.Customer"));
        assert!(!registry.contains("indykite.config.v1.Nope"));
    }
}
