//! The synchronous request subset.
//!
//! These requests depend only on their arguments and process-wide
//! static configuration; they touch no instance state and may therefore
//! run on the caller's thread.

// Layer 1: Standard library
// (none)

// Layer 2: Third-party
// (none)

// Layer 3: Internal
use crate::api::{Function, Object};
use crate::text_entities::find_entities;
use tgsys_utils::log;

/// Run one synchronous request. The caller has already checked
/// [`Function::can_be_executed_synchronously`]; anything else is
/// refused with a caller error.
pub(crate) fn execute_function(function: Function) -> Object {
    match function {
        Function::GetTextEntities { text } => Object::TextEntities {
            entities: find_entities(&text),
        },
        Function::SetLogVerbosityLevel {
            new_verbosity_level,
        } => {
            if log::set_verbosity_level(new_verbosity_level) {
                Object::Ok
            } else {
                Object::Error {
                    code: 400,
                    message: "Wrong new verbosity level specified".to_string(),
                }
            }
        }
        Function::GetLogVerbosityLevel => Object::LogVerbosityLevel {
            verbosity_level: log::verbosity_level(),
        },
        Function::TestReturnError { error } => error,
        _ => Object::Error {
            code: 400,
            message: "The method can't be executed synchronously".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TextEntityType;

    #[test]
    fn test_get_text_entities() {
        let result = execute_function(Function::GetTextEntities {
            text: "@x /cmd".to_string(),
        });
        let Object::TextEntities { entities } = result else {
            unreachable!("expected textEntities, got {result:?}");
        };
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_type, TextEntityType::Mention);
        assert_eq!(entities[1].entity_type, TextEntityType::BotCommand);
    }

    #[test]
    fn test_return_error_is_passed_through() {
        let error = Object::Error {
            code: 404,
            message: "nope".to_string(),
        };
        assert_eq!(
            execute_function(Function::TestReturnError {
                error: error.clone()
            }),
            error
        );
    }

    #[test]
    fn test_bad_verbosity_level() {
        let result = execute_function(Function::SetLogVerbosityLevel {
            new_verbosity_level: -5,
        });
        assert!(matches!(result, Object::Error { code: 400, .. }));
    }
}
