//! Minimal driver of the multi-client JSON surface.
//!
//! ```sh
//! cargo run --example json_client
//! ```

use tgsys_client::json::{json_create_client_id, json_execute, json_receive, json_send};

fn main() {
    // The synchronous subset runs on the calling thread.
    let entities = json_execute(r#"{"@type":"getTextEntities","text":"hello @world /start"}"#);
    println!("execute -> {entities}");

    // Everything else flows through send/receive.
    let client_id = json_create_client_id();
    json_send(
        client_id,
        r#"{"@type":"testSquareInt","value":11,"@extra":"square"}"#,
    );
    json_send(client_id, r#"{"@type":"close"}"#);

    loop {
        let Some(response) = json_receive(10.0) else {
            continue;
        };
        println!("receive -> {response}");
        if response.contains("authorizationStateClosed") {
            break;
        }
    }
}
