//! End-to-end facade tests: request/response correlation, update
//! streams, multi-client isolation and the JSON surface.

#![allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity

use std::ffi::{CStr, CString};
use std::time::{Duration, Instant};

use tgsys_client::api::{Function, Object, TextEntityType};
use tgsys_client::json::{json_create_client_id, json_receive, json_send};
use tgsys_client::{Client, ClientJson, ClientManager, Response};

const TEST_DEADLINE: Duration = Duration::from_secs(10);

fn receive_until(
    manager: &ClientManager,
    mut predicate: impl FnMut(&Response) -> bool,
) -> Response {
    let deadline = Instant::now() + TEST_DEADLINE;
    while Instant::now() < deadline {
        if let Some(response) = manager.receive(0.1) {
            if predicate(&response) {
                return response;
            }
        }
    }
    unreachable!("expected response did not arrive within {TEST_DEADLINE:?}");
}

#[test]
fn s1_get_text_entities_synchronously() {
    let result = ClientManager::execute(Function::GetTextEntities {
        text: "@x /cmd".to_string(),
    });
    let Object::TextEntities { entities } = result else {
        unreachable!("expected textEntities, got {result:?}");
    };
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].offset, 0);
    assert_eq!(entities[0].length, 2);
    assert_eq!(entities[0].entity_type, TextEntityType::Mention);
    assert_eq!(entities[1].offset, 3);
    assert_eq!(entities[1].length, 4);
    assert_eq!(entities[1].entity_type, TextEntityType::BotCommand);
}

#[test]
fn s4_uninitialized_request_fails_then_close_ends_the_stream() {
    let manager = ClientManager::new();
    let client_id = manager.create_client_id();

    manager.send(
        client_id,
        7,
        Function::GetOption {
            name: "version".to_string(),
        },
    );
    let response = receive_until(&manager, |r| r.request_id == 7);
    assert_eq!(response.client_id, client_id);
    assert!(matches!(response.object, Object::Error { code: 400, .. }));

    manager.send(client_id, 8, Function::Close);
    let update = receive_until(&manager, |r| {
        r.request_id == 0
            && matches!(
                &r.object,
                Object::UpdateAuthorizationState { authorization_state }
                    if **authorization_state == Object::AuthorizationStateClosed
            )
    });
    assert_eq!(update.client_id, client_id);
}

#[test]
fn s5_concurrent_clients_are_isolated() {
    let manager = ClientManager::new();
    let client_a = manager.create_client_id();
    let client_b = manager.create_client_id();

    let send_a = {
        let manager = manager.clone();
        std::thread::spawn(move || {
            manager.send(client_a, 2, Function::TestSquareInt { value: 3 })
        })
    };
    let send_b = {
        let manager = manager.clone();
        std::thread::spawn(move || {
            manager.send(client_b, 2, Function::TestSquareInt { value: 3 })
        })
    };
    send_a.join().unwrap();
    send_b.join().unwrap();

    let mut results = std::collections::HashMap::new();
    while results.len() < 2 {
        let response = receive_until(&manager, |r| r.request_id == 2);
        let Object::TestInt { value } = response.object else {
            unreachable!("expected testInt, got {:?}", response.object);
        };
        assert!(results.insert(response.client_id, value).is_none());
    }
    assert_eq!(results.get(&client_a), Some(&9));
    assert_eq!(results.get(&client_b), Some(&9));
}

#[test]
fn invalid_ids_fail_through_the_response_queue() {
    let manager = ClientManager::new();
    let client_id = manager.create_client_id();

    manager.send(0, 1, Function::TestCallEmpty);
    let response = receive_until(&manager, |r| r.client_id == 0);
    assert!(matches!(response.object, Object::Error { code: 400, .. }));

    manager.send(123_456, 2, Function::TestCallEmpty);
    let response = receive_until(&manager, |r| r.client_id == 123_456);
    assert!(matches!(response.object, Object::Error { code: 400, .. }));

    manager.send(client_id, 0, Function::TestCallEmpty);
    let response = receive_until(&manager, |r| r.client_id == client_id && r.request_id == 0);
    assert!(matches!(response.object, Object::Error { code: 400, .. }));
}

#[test]
fn sends_after_close_fail_with_state_error() {
    let manager = ClientManager::new();
    let client_id = manager.create_client_id();

    manager.send(client_id, 1, Function::Close);
    receive_until(&manager, |r| r.request_id == 1);
    receive_until(&manager, |r| {
        r.request_id == 0
            && matches!(
                &r.object,
                Object::UpdateAuthorizationState { authorization_state }
                    if **authorization_state == Object::AuthorizationStateClosed
            )
    });

    manager.send(client_id, 2, Function::TestCallEmpty);
    let response = receive_until(&manager, |r| r.request_id == 2);
    assert!(matches!(response.object, Object::Error { code: 500, .. }));
}

#[test]
fn each_request_gets_exactly_one_response() {
    let manager = ClientManager::new();
    let client_id = manager.create_client_id();

    for request_id in 1..=20u64 {
        manager.send(client_id, request_id, Function::TestCallEmpty);
    }
    let mut seen = std::collections::HashSet::new();
    while seen.len() < 20 {
        let response = receive_until(&manager, |r| r.request_id != 0);
        assert_eq!(response.object, Object::Ok);
        assert!(seen.insert(response.request_id), "duplicate response");
    }
    // No stragglers.
    let mut extra_responses = 0;
    while let Some(response) = manager.receive(0.2) {
        if response.request_id != 0 {
            extra_responses += 1;
        }
    }
    assert_eq!(extra_responses, 0);
}

#[test]
fn responses_preserve_per_client_submission_order() {
    let manager = ClientManager::new();
    let client_id = manager.create_client_id();

    for request_id in 1..=50u64 {
        manager.send(client_id, request_id, Function::TestCallEmpty);
    }
    let mut expected = 1u64;
    while expected <= 50 {
        let response = receive_until(&manager, |r| r.request_id != 0);
        assert_eq!(response.request_id, expected);
        expected += 1;
    }
}

#[test]
fn client_ids_are_unique_and_positive_across_threads() {
    let manager = ClientManager::new();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let manager = manager.clone();
        handles.push(std::thread::spawn(move || {
            (0..100).map(|_| manager.create_client_id()).collect::<Vec<_>>()
        }));
    }
    let mut ids: Vec<i32> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    assert!(ids.iter().all(|id| *id > 0));
    ids.sort_unstable();
    let count = ids.len();
    ids.dedup();
    assert_eq!(ids.len(), count);
}

#[test]
fn receive_returns_within_the_timeout() {
    let manager = ClientManager::new();
    let started = Instant::now();
    assert!(manager.receive(0.5).is_none());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(450), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(700), "{elapsed:?}");
}

#[test]
fn execute_refuses_stateful_requests() {
    let result = ClientManager::execute(Function::TestSquareInt { value: 4 });
    let Object::Error { code, message } = result else {
        unreachable!("expected an error, got {result:?}");
    };
    assert_eq!(code, 400);
    assert!(message.contains("synchronously"));
}

#[test]
fn legacy_client_round_trip() {
    let client = Client::new();
    client.send(tgsys_client::client::Request {
        id: 11,
        function: Function::TestSquareInt { value: 5 },
    });
    let deadline = Instant::now() + TEST_DEADLINE;
    loop {
        assert!(Instant::now() < deadline);
        let Some(response) = client.receive(0.1) else {
            continue;
        };
        if response.id == 11 {
            assert_eq!(response.object, Object::TestInt { value: 25 });
            break;
        }
    }
}

/// The global-manager JSON surface is single-consumer, so everything
/// that touches it lives in this one test.
#[test]
fn json_abi_round_trips_extra_and_client_id() {
    // S6: @extra comes back verbatim, multi-client responses carry
    // @client_id.
    let client_id = json_create_client_id();
    json_send(
        client_id,
        r#"{"@type":"testSquareInt","value":3,"@extra":{"k":"v"}}"#,
    );
    let deadline = Instant::now() + TEST_DEADLINE;
    let response = loop {
        assert!(Instant::now() < deadline);
        match json_receive(0.1) {
            Some(response) if response.contains("testInt") => break response,
            _ => continue,
        }
    };
    assert!(response.contains(r#""value":9"#), "{response}");
    assert!(response.contains(r#""@extra":{"k":"v"}"#), "{response}");
    assert!(
        response.contains(&format!("\"@client_id\":{client_id}")),
        "{response}"
    );

    // Unparseable requests come back as error objects with @extra.
    json_send(client_id, r#"{"@type":"noSuchMethod","@extra":"tag-1"}"#);
    let response = loop {
        assert!(Instant::now() < deadline);
        match json_receive(0.1) {
            Some(response) if response.contains("tag-1") => break response,
            _ => continue,
        }
    };
    assert!(response.contains(r#""@type":"error""#), "{response}");
    assert!(response.contains(r#""code":400"#), "{response}");
}

#[test]
fn json_execute_subset() {
    let response = ClientJson::execute(r#"{"@type":"getTextEntities","text":"@x /cmd"}"#);
    assert!(response.contains("textEntities"), "{response}");
    assert!(response.contains("textEntityTypeMention"), "{response}");
    assert!(response.contains("textEntityTypeBotCommand"), "{response}");

    let response = ClientJson::execute(r#"{"@type":"testSquareInt","value":3}"#);
    assert!(response.contains(r#""code":400"#), "{response}");
}

#[test]
fn legacy_json_client_round_trip() {
    let client = ClientJson::new();
    client.send(r#"{"@type":"testSquareInt","value":"6","@extra":17}"#);
    let deadline = Instant::now() + TEST_DEADLINE;
    loop {
        assert!(Instant::now() < deadline);
        let Some(response) = client.receive(0.1) else {
            continue;
        };
        if response.contains("testInt") {
            assert!(response.contains(r#""value":36"#), "{response}");
            assert!(response.contains(r#""@extra":17"#), "{response}");
            break;
        }
    }
}

#[test]
fn ffi_execute_and_legacy_client() {
    // td_execute and the per-instance client do not touch the global
    // receive loop, so they are safe to exercise here.
    let request = CString::new(r#"{"@type":"getLogVerbosityLevel"}"#).unwrap();
    let response = unsafe { tgsys_client::ffi::td_execute(request.as_ptr()) };
    assert!(!response.is_null());
    let response = unsafe { CStr::from_ptr(response) }.to_str().unwrap();
    assert!(response.contains("logVerbosityLevel"), "{response}");

    let client = tgsys_client::ffi::td_json_client_create();
    let request = CString::new(r#"{"@type":"testCallEmpty"}"#).unwrap();
    unsafe { tgsys_client::ffi::td_json_client_send(client, request.as_ptr()) };
    let deadline = Instant::now() + TEST_DEADLINE;
    loop {
        assert!(Instant::now() < deadline);
        let response = unsafe { tgsys_client::ffi::td_json_client_receive(client, 0.1) };
        if response.is_null() {
            continue;
        }
        let response = unsafe { CStr::from_ptr(response) }.to_str().unwrap();
        if response.contains(r#""@type":"ok""#) {
            break;
        }
    }
    unsafe { tgsys_client::ffi::td_json_client_destroy(client) };
}
