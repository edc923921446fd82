//! The typed object universe of the client surface.
//!
//! [`Function`] is the request variant set; [`Object`] is the superset
//! covering responses and updates. Both serialize as `@type`-tagged JSON
//! objects with lower-camel-case constructor names and snake-case
//! fields. Constructor ids are the CRC32 of the constructor name;
//! `@type` accepts either form.
//!
//! JSON leniency rules: `null` is accepted as the zero value for any
//! field, and integer-typed fields accept both numeric and string JSON.

// Layer 1: Standard library
use std::collections::HashMap;
use std::sync::OnceLock;

// Layer 2: Third-party
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque client instance identifier. Positive values name live or
/// once-live instances.
pub type ClientId = i32;

/// Caller-chosen request identifier; 0 is reserved for unsolicited
/// updates.
pub type RequestId = u64;

/// Accept `null` as the zero value for any defaultable field.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Accept numeric, string or null JSON for an `i32` field.
fn flexible_i32<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlexibleI32;

    impl serde::de::Visitor<'_> for FlexibleI32 {
        type Value = i32;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("an integer, a stringified integer or null")
        }

        fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<i32, E> {
            i32::try_from(value)
                .map_err(|_| E::custom(format!("number {value} is out of range for an int32")))
        }

        fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<i32, E> {
            i32::try_from(value)
                .map_err(|_| E::custom(format!("number {value} is out of range for an int32")))
        }

        fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<i32, E> {
            value
                .trim()
                .parse::<i64>()
                .map_err(|_| E::custom(format!("string {value:?} is not an integer")))
                .and_then(|parsed| self.visit_i64(parsed))
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<i32, E> {
            Ok(0)
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<i32, E> {
            Ok(0)
        }
    }

    deserializer.deserialize_any(FlexibleI32)
}

fn default_error_object() -> Object {
    Object::Error {
        code: 0,
        message: String::new(),
    }
}

fn null_error_object<'de, D>(deserializer: D) -> Result<Object, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Object>::deserialize(deserializer)
        .map(|object| object.unwrap_or_else(default_error_object))
}

/// A request to a client instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum Function {
    /// Extract text entities (mentions, hashtags, bot commands, URLs).
    /// Can be called synchronously.
    GetTextEntities {
        #[serde(default, deserialize_with = "null_default")]
        text: String,
    },

    /// Change the internal log verbosity. Can be called synchronously.
    SetLogVerbosityLevel {
        #[serde(default, deserialize_with = "flexible_i32")]
        new_verbosity_level: i32,
    },

    /// Read the internal log verbosity. Can be called synchronously.
    GetLogVerbosityLevel,

    /// Return the given error; used to tunnel parse failures through
    /// the normal response channel. Can be called synchronously.
    TestReturnError {
        #[serde(default = "default_error_object", deserialize_with = "null_error_object")]
        error: Object,
    },

    /// Return the squared number.
    TestSquareInt {
        #[serde(default, deserialize_with = "flexible_i32")]
        value: i32,
    },

    /// Do nothing and return `ok`.
    TestCallEmpty,

    /// Read the current authorization state of the instance.
    GetAuthorizationState,

    /// Read a client option; requires an initialized instance.
    GetOption {
        #[serde(default, deserialize_with = "null_default")]
        name: String,
    },

    /// Close the client instance.
    Close,
}

impl Function {
    /// Check whether this request may be passed to
    /// [`ClientManager::execute`](crate::ClientManager::execute): its
    /// semantics depend only on its arguments and process-wide static
    /// configuration.
    pub fn can_be_executed_synchronously(&self) -> bool {
        matches!(
            self,
            Function::GetTextEntities { .. }
                | Function::SetLogVerbosityLevel { .. }
                | Function::GetLogVerbosityLevel
                | Function::TestReturnError { .. }
        )
    }
}

/// A response or update object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum Object {
    /// Empty success marker.
    Ok,

    /// Failure record; `code` follows HTTP semantics, 0 means an
    /// internal error.
    Error {
        #[serde(default, deserialize_with = "flexible_i32")]
        code: i32,
        #[serde(default, deserialize_with = "null_default")]
        message: String,
    },

    /// A number.
    TestInt {
        #[serde(default, deserialize_with = "flexible_i32")]
        value: i32,
    },

    /// Entities found in a text.
    TextEntities {
        #[serde(default, deserialize_with = "null_default")]
        entities: Vec<TextEntity>,
    },

    /// Current internal log verbosity.
    LogVerbosityLevel {
        #[serde(default, deserialize_with = "flexible_i32")]
        verbosity_level: i32,
    },

    /// The instance waits for initialization parameters.
    AuthorizationStateWaitTdlibParameters,

    /// The instance is closed; the last update of its stream.
    AuthorizationStateClosed,

    /// The authorization state of an instance changed.
    UpdateAuthorizationState {
        authorization_state: Box<Object>,
    },
}

/// One entity inside a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEntity {
    /// Offset of the entity in UTF-16 code units.
    #[serde(default, deserialize_with = "flexible_i32")]
    pub offset: i32,
    /// Length of the entity in UTF-16 code units.
    #[serde(default, deserialize_with = "flexible_i32")]
    pub length: i32,
    /// Kind of the entity.
    #[serde(rename = "type")]
    pub entity_type: TextEntityType,
}

/// Kind of a text entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum TextEntityType {
    /// A mention of a user by username.
    #[serde(rename = "textEntityTypeMention")]
    Mention,
    /// A bot command starting with `/`.
    #[serde(rename = "textEntityTypeBotCommand")]
    BotCommand,
    /// A hashtag starting with `#`.
    #[serde(rename = "textEntityTypeHashtag")]
    Hashtag,
    /// A bare URL.
    #[serde(rename = "textEntityTypeUrl")]
    Url,
}

/// Every constructor name known to this build, functions and objects
/// alike.
const KNOWN_CONSTRUCTORS: &[&str] = &[
    "getTextEntities",
    "setLogVerbosityLevel",
    "getLogVerbosityLevel",
    "testReturnError",
    "testSquareInt",
    "testCallEmpty",
    "getAuthorizationState",
    "getOption",
    "close",
    "ok",
    "error",
    "testInt",
    "textEntities",
    "textEntity",
    "textEntityTypeMention",
    "textEntityTypeBotCommand",
    "textEntityTypeHashtag",
    "textEntityTypeUrl",
    "logVerbosityLevel",
    "authorizationStateWaitTdlibParameters",
    "authorizationStateClosed",
    "updateAuthorizationState",
];

/// The 32-bit constructor id of a constructor name.
pub fn constructor_id(name: &str) -> u32 {
    crc32fast::hash(name.as_bytes())
}

/// Resolve a numeric constructor id back to its name.
pub fn constructor_name(id: u32) -> Option<&'static str> {
    static BY_ID: OnceLock<HashMap<u32, &'static str>> = OnceLock::new();
    BY_ID
        .get_or_init(|| {
            KNOWN_CONSTRUCTORS
                .iter()
                .map(|name| (constructor_id(name), *name))
                .collect()
        })
        .get(&id)
        .copied()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    #[test]
    fn test_function_type_tags() {
        let json = serde_json::to_string(&Function::TestSquareInt { value: 3 }).unwrap();
        assert_eq!(json, r#"{"@type":"testSquareInt","value":3}"#);

        let json = serde_json::to_string(&Function::Close).unwrap();
        assert_eq!(json, r#"{"@type":"close"}"#);
    }

    #[test]
    fn test_object_type_tags() {
        let json = serde_json::to_string(&Object::Ok).unwrap();
        assert_eq!(json, r#"{"@type":"ok"}"#);

        let update = Object::UpdateAuthorizationState {
            authorization_state: Box::new(Object::AuthorizationStateClosed),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(
            json,
            r#"{"@type":"updateAuthorizationState","authorization_state":{"@type":"authorizationStateClosed"}}"#
        );
    }

    #[test]
    fn test_flexible_int_accepts_strings_and_null() {
        let f: Function =
            serde_json::from_str(r#"{"@type":"testSquareInt","value":"12"}"#).unwrap();
        assert_eq!(f, Function::TestSquareInt { value: 12 });

        let f: Function =
            serde_json::from_str(r#"{"@type":"testSquareInt","value":null}"#).unwrap();
        assert_eq!(f, Function::TestSquareInt { value: 0 });

        let f: Function = serde_json::from_str(r#"{"@type":"testSquareInt"}"#).unwrap();
        assert_eq!(f, Function::TestSquareInt { value: 0 });
    }

    #[test]
    fn test_flexible_int_rejects_out_of_range() {
        let result =
            serde_json::from_str::<Function>(r#"{"@type":"testSquareInt","value":3000000000}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_null_string_is_zero_value() {
        let f: Function =
            serde_json::from_str(r#"{"@type":"getTextEntities","text":null}"#).unwrap();
        assert_eq!(f, Function::GetTextEntities { text: String::new() });
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let f: Function = serde_json::from_str(
            r#"{"@type":"testCallEmpty","@extra":{"k":"v"},"unknown_field":1}"#,
        )
        .unwrap();
        assert_eq!(f, Function::TestCallEmpty);
    }

    #[test]
    fn test_constructor_ids_are_stable_and_resolvable() {
        for name in KNOWN_CONSTRUCTORS {
            assert_eq!(constructor_name(constructor_id(name)), Some(*name));
        }
        assert_eq!(constructor_name(0xdead_beef), None);
    }

    #[test]
    fn test_synchronous_subset() {
        assert!(Function::GetTextEntities { text: String::new() }.can_be_executed_synchronously());
        assert!(Function::GetLogVerbosityLevel.can_be_executed_synchronously());
        assert!(!Function::TestSquareInt { value: 1 }.can_be_executed_synchronously());
        assert!(!Function::Close.can_be_executed_synchronously());
        assert!(!Function::GetOption { name: String::new() }.can_be_executed_synchronously());
    }

    #[test]
    fn test_nested_error_round_trip() {
        let f: Function = serde_json::from_str(
            r#"{"@type":"testReturnError","error":{"@type":"error","code":404,"message":"gone"}}"#,
        )
        .unwrap();
        assert_eq!(
            f,
            Function::TestReturnError {
                error: Object::Error {
                    code: 404,
                    message: "gone".to_string()
                }
            }
        );
    }
}
